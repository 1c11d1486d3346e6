use std::collections::HashMap;

use candle_core::{Device, Tensor};
use tempfile::TempDir;

use triage_core::features::FEATURE_DIM;
use triage_core::types::{
    Chunk, DecisionMethod, DocMeta, PatientSnapshot, Severity, VitalSigns, CLASS_ORDER,
};
use triage_embed::HashedEmbedder;
use triage_engine::{SeverityClassifier, TriageEngine};
use triage_index::VectorIndex;
use triage_retrieval::{RetrievalConfig, RetrievalOrchestrator};

fn chunk(id: &str, text: &str, source: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        meta: DocMeta::for_source(source),
        chunk_index: 0,
        start_char: 0,
        end_char: text.chars().count(),
        is_chunked: false,
    }
}

async fn engine_with(
    chunks: &[Chunk],
    classifier: Option<SeverityClassifier>,
) -> (TriageEngine, TempDir) {
    let tmp = TempDir::new().expect("tempdir");
    let index = VectorIndex::open(
        tmp.path(),
        "medical_chunks",
        Box::new(HashedEmbedder::new(128)),
    )
    .await
    .expect("open index");
    if !chunks.is_empty() {
        index.add_documents(chunks).await.expect("add");
    }
    let orchestrator = RetrievalOrchestrator::new(index, RetrievalConfig::default());
    (TriageEngine::new(orchestrator, classifier), tmp)
}

/// Writes a linear model whose bias makes `favored` the argmax for any
/// physiologic feature vector (weights are zero).
fn write_model(dir: &TempDir, favored: Severity) -> std::path::PathBuf {
    let path = dir.path().join("severity_linear.safetensors");
    let bias: Vec<f32> = CLASS_ORDER
        .iter()
        .map(|&s| if s == favored { 4.0 } else { 0.0 })
        .collect();
    let weight = Tensor::zeros((CLASS_ORDER.len(), FEATURE_DIM), candle_core::DType::F32, &Device::Cpu)
        .expect("weight");
    let bias = Tensor::from_vec(bias, CLASS_ORDER.len(), &Device::Cpu).expect("bias");
    let mut tensors = HashMap::new();
    tensors.insert("weight".to_string(), weight);
    tensors.insert("bias".to_string(), bias);
    candle_core::safetensors::save(&tensors, &path).expect("save model");
    path
}

#[tokio::test]
async fn severe_hypoxia_forces_rule_override() {
    let (engine, _tmp) = engine_with(&[], None).await;
    let patient = PatientSnapshot {
        vitals: VitalSigns {
            spo2: Some(85.0),
            ..VitalSigns::default()
        },
        ..PatientSnapshot::default()
    };

    let decision = engine.decide(&patient).await;
    assert_eq!(decision.severity, Severity::Rouge);
    assert!((decision.confidence - 1.0).abs() < f32::EPSILON);
    assert_eq!(decision.method, DecisionMethod::RuleOverride);
    assert!(decision
        .red_flags
        .iter()
        .any(|f| f.contains("Hypoxie sévère")));
    assert!((decision.probabilities[&Severity::Rouge] - 1.0).abs() < f32::EPSILON);
    assert!(decision.probabilities[&Severity::Vert].abs() < f32::EPSILON);
}

#[tokio::test]
async fn chest_pain_with_low_saturation_is_vital_emergency() {
    let (engine, _tmp) = engine_with(&[], None).await;
    let patient = PatientSnapshot {
        age: Some(40.0),
        symptoms: vec!["douleur thoracique".to_string()],
        vitals: VitalSigns {
            spo2: Some(88.0),
            fc: Some(95.0),
            fr: Some(18.0),
            ta_systolic: Some(120.0),
            ta_diastolic: Some(80.0),
            temperature: Some(37.0),
        },
        ..PatientSnapshot::default()
    };

    let decision = engine.decide(&patient).await;
    assert_eq!(decision.severity, Severity::Rouge);
    assert_eq!(decision.method, DecisionMethod::RuleOverride);
    assert!(decision.justification.contains("ROUGE"));
    assert!(decision.justification.contains("douleur thoracique"));
    assert_eq!(decision.rag_sources[0], "Protocoles ROUGE");
}

#[tokio::test]
async fn benign_symptoms_without_classifier_fall_back_to_vert() {
    let (engine, _tmp) = engine_with(&[], None).await;
    let patient = PatientSnapshot {
        age: Some(25.0),
        symptoms: vec!["entorse cheville".to_string()],
        vitals: VitalSigns {
            spo2: Some(99.0),
            fc: Some(72.0),
            fr: Some(14.0),
            ta_systolic: Some(118.0),
            ta_diastolic: Some(76.0),
            temperature: Some(36.8),
        },
        ..PatientSnapshot::default()
    };

    let decision = engine.decide(&patient).await;
    assert_eq!(decision.severity, Severity::Vert);
    assert!((decision.confidence - 0.5).abs() < f32::EPSILON);
    assert_eq!(decision.method, DecisionMethod::Fallback);
    assert!(decision.red_flags.is_empty());
    // empty index: the canned VERT recommendation fills in
    assert!(decision.justification.contains("24-48h"));
}

#[tokio::test]
async fn no_symptoms_no_vitals_is_gris() {
    let (engine, _tmp) = engine_with(&[], None).await;
    let decision = engine.decide(&PatientSnapshot::default()).await;
    assert_eq!(decision.severity, Severity::Gris);
    assert_eq!(decision.method, DecisionMethod::Fallback);
}

#[tokio::test]
async fn classifier_path_reports_full_distribution() {
    let tmp = TempDir::new().expect("tempdir");
    let model_path = write_model(&tmp, Severity::Jaune);
    let classifier = SeverityClassifier::load(&model_path).expect("load model");

    let outcome = classifier.predict(&PatientSnapshot::default());
    assert_eq!(outcome.severity, Severity::Jaune);
    let sum: f32 = outcome.probabilities.values().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert_eq!(outcome.probabilities.len(), CLASS_ORDER.len());
    assert!(outcome.confidence > 0.9);

    let (engine, _tmp) = engine_with(&[], Some(classifier)).await;
    let decision = engine.decide(&PatientSnapshot::default()).await;
    assert_eq!(decision.severity, Severity::Jaune);
    assert_eq!(decision.method, DecisionMethod::Classifier);
    let sum: f32 = decision.probabilities.values().sum();
    assert!((sum - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn rule_override_wins_even_with_classifier_loaded() {
    let tmp = TempDir::new().expect("tempdir");
    let model_path = write_model(&tmp, Severity::Gris);
    let classifier = SeverityClassifier::load(&model_path).expect("load model");

    let (engine, _tmp) = engine_with(&[], Some(classifier)).await;
    let patient = PatientSnapshot {
        vitals: VitalSigns {
            fc: Some(150.0),
            ..VitalSigns::default()
        },
        ..PatientSnapshot::default()
    };
    let decision = engine.decide(&patient).await;
    assert_eq!(decision.severity, Severity::Rouge);
    assert_eq!(decision.method, DecisionMethod::RuleOverride);
    assert!(decision
        .red_flags
        .iter()
        .any(|f| f.contains("Tachycardie extrême")));
}

#[tokio::test]
async fn retrieved_protocol_feeds_recommendation_and_sources() {
    let doc = chunk(
        "resp-1",
        "désaturation hypoxie SpO2 basse: mettre en place une oxygénothérapie au masque \
         haute concentration, surveiller la saturation en continu et préparer un transfert \
         en réanimation si la SpO2 reste inférieure à 90%.",
        "respiratoire.txt",
    );
    let (engine, _tmp) = engine_with(&[doc], None).await;
    let patient = PatientSnapshot {
        vitals: VitalSigns {
            spo2: Some(85.0),
            ..VitalSigns::default()
        },
        ..PatientSnapshot::default()
    };

    let decision = engine.decide(&patient).await;
    assert_eq!(decision.severity, Severity::Rouge);
    assert!(decision.justification.contains("oxygénothérapie"));
    assert!(decision
        .rag_sources
        .iter()
        .any(|s| s == "respiratoire.txt"));
}

#[test]
fn malformed_model_is_rejected() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("bad.safetensors");
    let weight = Tensor::zeros((2, 3), candle_core::DType::F32, &Device::Cpu).expect("weight");
    let bias = Tensor::zeros(2, candle_core::DType::F32, &Device::Cpu).expect("bias");
    let mut tensors = HashMap::new();
    tensors.insert("weight".to_string(), weight);
    tensors.insert("bias".to_string(), bias);
    candle_core::safetensors::save(&tensors, &path).expect("save model");

    assert!(SeverityClassifier::load(&path).is_err());
}
