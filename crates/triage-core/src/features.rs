//! Clinical feature construction for the severity classifier.
//!
//! This is the single place where missing vitals are substituted. The
//! defaults are population-plausible resting values, not sentinels: the
//! classifier was trained on physiologic ranges and a negative placeholder
//! would read as an extreme vital.

use crate::types::{PatientSnapshot, Sex};

pub const FEATURE_DIM: usize = 8;

/// Per-field defaults applied when a vital is missing.
pub const DEFAULT_FC: f32 = 75.0;
pub const DEFAULT_FR: f32 = 16.0;
pub const DEFAULT_SPO2: f32 = 98.0;
pub const DEFAULT_TA_SYS: f32 = 120.0;
pub const DEFAULT_TA_DIA: f32 = 80.0;
pub const DEFAULT_TEMP: f32 = 37.0;
pub const DEFAULT_AGE: f32 = 40.0;

/// Blood pressure is sometimes entered in cmHg ("12" for 120 mmHg).
/// Values at or below the plausibility floor are scaled by 10.
pub fn normalize_systolic(tas: f32) -> f32 {
    if tas > 50.0 {
        tas
    } else {
        tas * 10.0
    }
}

pub fn normalize_diastolic(tad: f32) -> f32 {
    if tad > 30.0 {
        tad
    } else {
        tad * 10.0
    }
}

/// Fixed 8-element ordered feature vector:
/// `[FC, FR, SpO2, TA_sys, TA_dia, Temp, Age, SexEncoded]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClinicalFeatures(pub [f32; FEATURE_DIM]);

impl ClinicalFeatures {
    pub fn from_snapshot(snapshot: &PatientSnapshot) -> Self {
        let v = &snapshot.vitals;
        let sex_encoded = match snapshot.sex {
            Some(Sex::Male) => 1.0,
            _ => 0.0,
        };
        Self([
            v.fc.unwrap_or(DEFAULT_FC),
            v.fr.unwrap_or(DEFAULT_FR),
            v.spo2.unwrap_or(DEFAULT_SPO2),
            normalize_systolic(v.ta_systolic.unwrap_or(DEFAULT_TA_SYS)),
            normalize_diastolic(v.ta_diastolic.unwrap_or(DEFAULT_TA_DIA)),
            v.temperature.unwrap_or(DEFAULT_TEMP),
            snapshot.age.unwrap_or(DEFAULT_AGE),
            sex_encoded,
        ])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn fc(&self) -> f32 {
        self.0[0]
    }
    pub fn fr(&self) -> f32 {
        self.0[1]
    }
    pub fn spo2(&self) -> f32 {
        self.0[2]
    }
    pub fn ta_systolic(&self) -> f32 {
        self.0[3]
    }
    pub fn ta_diastolic(&self) -> f32 {
        self.0[4]
    }
    pub fn temperature(&self) -> f32 {
        self.0[5]
    }
    pub fn age(&self) -> f32 {
        self.0[6]
    }
}
