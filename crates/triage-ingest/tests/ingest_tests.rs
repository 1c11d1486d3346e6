use std::fs;
use tempfile::TempDir;

use triage_ingest::{chunk_documents, load_directory, load_path, ChunkingConfig};

#[test]
fn load_directory_skips_broken_files() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "Douleur thoracique avec irradiation au bras gauche.").unwrap();
    fs::write(dir.join("b.json"), "{not valid json").unwrap();
    fs::write(dir.join("c.txt"), "   ").unwrap(); // empty after trim
    fs::write(dir.join("d.bin"), "ignored entirely").unwrap();

    let (docs, summary) = load_directory(dir).expect("load");
    assert_eq!(summary.files_scanned, 3, "d.bin is not a supported candidate");
    assert_eq!(summary.files_ingested, 1);
    assert_eq!(summary.files_skipped, 2);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].meta.source, "a.txt");
}

#[test]
fn json_array_with_metadata() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("cases.json");
    fs::write(
        &path,
        r#"[
            {"text": "Infarctus du myocarde: douleur rétrosternale.", "metadata": {"title": "Cardiologie", "section": "SCA", "niveau": "ROUGE"}},
            {"text": "Entorse de cheville: traumatisme bénin.", "metadata": {"title": "Traumatologie"}}
        ]"#,
    )
    .unwrap();

    let docs = load_path(&path).expect("load");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].meta.title.as_deref(), Some("Cardiologie"));
    assert_eq!(docs[0].meta.section.as_deref(), Some("SCA"));
    assert_eq!(docs[0].meta.extra.get("niveau").map(String::as_str), Some("ROUGE"));
    assert_eq!(docs[1].meta.source, "cases.json");
}

#[test]
fn paginated_json_one_document_per_page() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("protocole.json");
    fs::write(
        &path,
        r#"{"pages": [
            {"page": 1, "text": "Page une: critères de tri."},
            {"page": 2, "text": "Page deux: signes de gravité."}
        ]}"#,
    )
    .unwrap();

    let docs = load_path(&path).expect("load");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].meta.page, Some(1));
    assert_eq!(docs[1].meta.page, Some(2));
}

#[test]
fn tabular_prefers_text_column() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("cas.csv");
    fs::write(
        &path,
        "id,text,gravite\n1,Céphalée brutale en coup de tonnerre,ROUGE\n2,Toux sèche isolée,VERT\n",
    )
    .unwrap();

    let docs = load_path(&path).expect("load");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].text, "Céphalée brutale en coup de tonnerre");
    assert_eq!(docs[0].meta.extra.get("gravite").map(String::as_str), Some("ROUGE"));
    assert_eq!(docs[0].meta.extra.get("id").map(String::as_str), Some("1"));
}

#[test]
fn pages_longer_than_chunk_size_get_rechunked() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("long.json");
    let long_page = "Une phrase clinique assez longue pour un protocole. ".repeat(20);
    fs::write(
        &path,
        serde_json::to_string(&serde_json::json!({
            "pages": [{"page": 1, "text": long_page}]
        }))
        .unwrap(),
    )
    .unwrap();

    let docs = load_path(&path).expect("load");
    let cfg = ChunkingConfig::new(200, 40).expect("config");
    let chunks = chunk_documents(&docs, &cfg);
    assert!(chunks.len() > 1, "a long page splits into several chunks");
    for c in &chunks {
        assert_eq!(c.meta.page, Some(1), "chunks inherit the page metadata");
        assert!(c.is_chunked);
    }
}
