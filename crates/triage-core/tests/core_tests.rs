use triage_core::error::Error;
use triage_core::types::{
    DecisionMethod, PatientSnapshot, Severity, TriageDecision, CLASS_ORDER,
};

#[test]
fn severity_clinical_ordering() {
    assert!(Severity::Gris < Severity::Vert);
    assert!(Severity::Vert < Severity::Jaune);
    assert!(Severity::Jaune < Severity::Rouge);
}

#[test]
fn severity_serializes_uppercase() {
    assert_eq!(
        serde_json::to_string(&Severity::Rouge).expect("serialize"),
        "\"ROUGE\""
    );
    let back: Severity = serde_json::from_str("\"JAUNE\"").expect("deserialize");
    assert_eq!(back, Severity::Jaune);
}

#[test]
fn method_serializes_as_tags() {
    assert_eq!(
        serde_json::to_string(&DecisionMethod::RuleOverride).expect("serialize"),
        "\"rule-override\""
    );
    assert_eq!(DecisionMethod::Fallback.as_str(), "fallback");
}

#[test]
fn one_hot_covers_all_classes() {
    let probs = TriageDecision::one_hot(Severity::Rouge);
    assert_eq!(probs.len(), CLASS_ORDER.len());
    assert_eq!(probs[&Severity::Rouge], 1.0);
    let total: f32 = probs.values().sum();
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn content_error_names_the_file() {
    let err = Error::Content {
        file: "gastro.txt".to_string(),
        reason: "invalid UTF-8".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Unreadable content in gastro.txt: invalid UTF-8"
    );
    // no cause chain: the offending file is plain data, not a nested error
    assert!(std::error::Error::source(&err).is_none());
}

#[test]
fn patient_snapshot_tolerates_sparse_json() {
    let snapshot: PatientSnapshot = serde_json::from_str(
        r#"{"age": 40, "symptoms": ["douleur thoracique"], "vitals": {"spo2": 88}}"#,
    )
    .expect("parse");
    assert_eq!(snapshot.age, Some(40.0));
    assert_eq!(snapshot.vitals.spo2, Some(88.0));
    assert!(snapshot.vitals.fc.is_none());
    assert!(snapshot.history.is_empty());
}
