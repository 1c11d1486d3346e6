//! Linear severity classifier over the clinical feature vector.
//!
//! The model is a single dense layer trained offline and shipped as a
//! safetensors artifact with two tensors: `weight` of shape
//! `[4, FEATURE_DIM]` and `bias` of shape `[4]`, rows in [`CLASS_ORDER`]
//! order. Weights are extracted to plain vectors at load time so prediction
//! is allocation-light and needs no device state.

use std::collections::BTreeMap;
use std::path::Path;

use candle_core::Device;
use tracing::info;
use triage_core::error::{Error, Result};
use triage_core::features::{ClinicalFeatures, FEATURE_DIM};
use triage_core::types::{PatientSnapshot, Severity, CLASS_ORDER};

/// A classifier prediction: the argmax class plus the full distribution.
#[derive(Debug, Clone)]
pub struct ClassifierOutcome {
    pub severity: Severity,
    pub confidence: f32,
    pub probabilities: BTreeMap<Severity, f32>,
}

pub struct SeverityClassifier {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl SeverityClassifier {
    /// Loads the linear model from a safetensors file.
    ///
    /// Shape mismatches are configuration errors: a wrong artifact must not
    /// silently produce garbage probabilities.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::InvalidConfig(format!(
                "classifier model not found: {}",
                path.display()
            )));
        }
        let tensors = candle_core::safetensors::load(path, &Device::Cpu)
            .map_err(|e| Error::InvalidConfig(format!("cannot read {}: {e}", path.display())))?;

        let weight = tensors
            .get("weight")
            .ok_or_else(|| Error::InvalidConfig("model is missing 'weight' tensor".to_string()))?;
        let bias = tensors
            .get("bias")
            .ok_or_else(|| Error::InvalidConfig("model is missing 'bias' tensor".to_string()))?;

        let n_classes = CLASS_ORDER.len();
        if weight.dims() != [n_classes, FEATURE_DIM] {
            return Err(Error::InvalidConfig(format!(
                "weight tensor has shape {:?}, expected [{n_classes}, {FEATURE_DIM}]",
                weight.dims()
            )));
        }
        if bias.dims() != [n_classes] {
            return Err(Error::InvalidConfig(format!(
                "bias tensor has shape {:?}, expected [{n_classes}]",
                bias.dims()
            )));
        }

        let weights = weight
            .to_vec2::<f32>()
            .map_err(|e| Error::InvalidConfig(format!("weight tensor is not f32: {e}")))?;
        let bias = bias
            .to_vec1::<f32>()
            .map_err(|e| Error::InvalidConfig(format!("bias tensor is not f32: {e}")))?;

        info!(model = %path.display(), "loaded severity classifier");
        Ok(Self { weights, bias })
    }

    /// Scores a snapshot. Missing vitals are substituted by
    /// [`ClinicalFeatures::from_snapshot`] before scoring.
    pub fn predict(&self, patient: &PatientSnapshot) -> ClassifierOutcome {
        let features = ClinicalFeatures::from_snapshot(patient);
        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                row.iter()
                    .zip(features.as_slice())
                    .map(|(w, x)| w * x)
                    .sum::<f32>()
                    + b
            })
            .collect();

        let probs = softmax(&logits);
        let (best_idx, best_p) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

        let probabilities = CLASS_ORDER
            .iter()
            .copied()
            .zip(probs.iter().copied())
            .collect();

        ClassifierOutcome {
            severity: CLASS_ORDER[best_idx],
            confidence: best_p,
            probabilities,
        }
    }
}

/// Numerically stable softmax (shifted by the max logit).
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::MIN, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}
