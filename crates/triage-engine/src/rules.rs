//! Deterministic safety rules.
//!
//! These run before any model and are the only path allowed to force a
//! ROUGE decision. Checks are grouped into four clinical categories;
//! each category reports at most one flag, the most severe first. A rule
//! fires only when the vitals it reads are present; missing values never
//! trigger a flag.

use triage_core::features::{normalize_diastolic, normalize_systolic};
use triage_core::types::PatientSnapshot;

/// Evaluates the red-flag threshold table against a snapshot.
/// Thresholds follow the SAMU/SFMU vital-emergency criteria.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyRuleEngine;

impl SafetyRuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Returns every red flag raised by the snapshot, in category order.
    ///
    /// Blood pressure is normalized before comparison so shorthand entries
    /// ("12" for 120 mmHg) hit the same thresholds as full values.
    #[allow(clippy::unused_self)]
    pub fn evaluate(&self, patient: &PatientSnapshot) -> Vec<String> {
        let v = &patient.vitals;
        let tas = v.ta_systolic.map(normalize_systolic);
        let tad = v.ta_diastolic.map(normalize_diastolic);

        [
            respiratory_distress(v.spo2, v.fr),
            hemodynamic_shock(v.fc, tas),
            thermal_emergency(patient.age, v.temperature),
            hypertensive_emergency(tas, tad),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

fn respiratory_distress(spo2: Option<f32>, fr: Option<f32>) -> Option<String> {
    if matches!(spo2, Some(s) if s < 90.0) {
        return Some("Hypoxie sévère (SpO2 < 90%)".to_string());
    }
    if let (Some(s), Some(r)) = (spo2, fr) {
        if s < 92.0 && r > 30.0 {
            return Some("Détresse respiratoire (SpO2 < 92% + polypnée)".to_string());
        }
    }
    if matches!(fr, Some(r) if !(10.0..=35.0).contains(&r)) {
        return Some("Fréquence respiratoire critique".to_string());
    }
    None
}

fn hemodynamic_shock(fc: Option<f32>, tas: Option<f32>) -> Option<String> {
    if matches!(tas, Some(s) if s < 90.0) {
        return Some("Hypotension artérielle (TAS < 90 mmHg)".to_string());
    }
    if matches!(fc, Some(f) if f > 130.0) {
        return Some("Tachycardie extrême (FC > 130 bpm)".to_string());
    }
    if matches!(fc, Some(f) if f < 40.0) {
        return Some("Bradycardie sévère (FC < 40 bpm)".to_string());
    }
    if let (Some(f), Some(s)) = (fc, tas) {
        if f < 50.0 && s < 90.0 {
            return Some("État de choc (bradycardie + hypotension)".to_string());
        }
    }
    None
}

fn thermal_emergency(age: Option<f32>, temp: Option<f32>) -> Option<String> {
    let t = temp?;
    if t < 32.0 {
        return Some("Hypothermie profonde (< 32°C)".to_string());
    }
    if t > 40.0 {
        return Some("Hyperthermie maligne (> 40°C)".to_string());
    }
    let a = age?;
    if a <= 1.0 && t > 38.0 {
        return Some("Fièvre nourrisson (< 1 an, > 38°C)".to_string());
    }
    if a <= 3.0 && t > 38.5 {
        return Some("Forte fièvre jeune enfant (< 3 ans, > 38.5°C)".to_string());
    }
    if a >= 75.0 && t > 39.5 {
        return Some("Fièvre personne âgée (> 75 ans, > 39.5°C)".to_string());
    }
    None
}

fn hypertensive_emergency(tas: Option<f32>, tad: Option<f32>) -> Option<String> {
    if tas.is_some_and(|s| s >= 180.0) || tad.is_some_and(|d| d >= 120.0) {
        return Some("Crise hypertensive (TAS ≥ 180 ou TAD ≥ 120)".to_string());
    }
    None
}
