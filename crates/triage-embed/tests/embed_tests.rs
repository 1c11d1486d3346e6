use triage_embed::{EmbeddingProvider, HashedEmbedder};

fn l2(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    1.0 - dot / (l2(a) * l2(b)).max(1e-6)
}

#[test]
fn hashed_embeddings_are_deterministic() {
    let e = HashedEmbedder::new(128);
    let a = e.embed_text("douleur thoracique oppression").expect("embed");
    let b = e.embed_text("douleur thoracique oppression").expect("embed");
    assert_eq!(a, b);
    assert_eq!(a.len(), 128);
}

#[test]
fn hashed_embeddings_are_normalized() {
    let e = HashedEmbedder::new(64);
    let v = e.embed_text("fièvre et frissons depuis hier").expect("embed");
    assert!((l2(&v) - 1.0).abs() < 1e-4);
}

#[test]
fn token_overlap_beats_disjoint_text() {
    let e = HashedEmbedder::new(256);
    let anchor = e.embed_text("douleur thoracique intense").expect("embed");
    let close = e.embed_text("douleur thoracique").expect("embed");
    let far = e.embed_text("entorse cheville gauche").expect("embed");
    assert!(
        cosine_distance(&anchor, &close) < cosine_distance(&anchor, &far),
        "shared tokens must rank closer"
    );
}

#[test]
fn batch_matches_single_calls() {
    let e = HashedEmbedder::new(96);
    let texts = vec!["tachycardie".to_string(), "bradycardie".to_string()];
    let batch = e.embed_batch(&texts).expect("batch");
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], e.embed_text("tachycardie").expect("embed"));
    assert_eq!(batch[1], e.embed_text("bradycardie").expect("embed"));
}
