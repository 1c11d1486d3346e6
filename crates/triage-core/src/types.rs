//! Domain types shared by the ingestion, retrieval and decision crates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type ChunkId = String;

/// Severity levels, ordered least to most urgent.
///
/// The derived `Ord` follows that clinical ordering, not the classifier's
/// output ordering (see [`CLASS_ORDER`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Gris,
    Vert,
    Jaune,
    Rouge,
}

/// Fixed ordering of the classifier's output classes (alphabetical, matching
/// the trained artifact's label encoding).
pub const CLASS_ORDER: [Severity; 4] = [
    Severity::Gris,
    Severity::Jaune,
    Severity::Rouge,
    Severity::Vert,
];

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Gris => "GRIS",
            Severity::Vert => "VERT",
            Severity::Jaune => "JAUNE",
            Severity::Rouge => "ROUGE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Rouge => "URGENCE VITALE",
            Severity::Jaune => "URGENCE",
            Severity::Vert => "NON URGENT",
            Severity::Gris => "PAS D'URGENCE",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Severity::Rouge => "APPELER LE 15",
            Severity::Jaune => "Urgences dans l'heure",
            Severity::Vert => "Consultation 24-48h",
            Severity::Gris => "RDV médecin",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path produced a decision. Degraded paths stay visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionMethod {
    #[serde(rename = "rule-override")]
    RuleOverride,
    #[serde(rename = "classifier")]
    Classifier,
    #[serde(rename = "fallback")]
    Fallback,
}

impl DecisionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionMethod::RuleOverride => "rule-override",
            DecisionMethod::Classifier => "classifier",
            DecisionMethod::Fallback => "fallback",
        }
    }
}

/// Metadata carried by a source document and inherited by its chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<i32>,
    /// Extra key/value metadata (e.g. folded tabular columns).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl DocMeta {
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

/// A source document. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub meta: DocMeta,
}

/// A bounded span of a document's text, independently indexed.
///
/// `start_char`/`end_char` are character offsets into the source text, not
/// byte offsets. `text` is never empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Content-derived id; an empty id is assigned by the index at insert.
    pub id: ChunkId,
    pub text: String,
    pub meta: DocMeta,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub is_chunked: bool,
}

/// A search result. `score` is a cosine distance: lower = more similar.
/// Every sort and threshold in the pipeline uses this single polarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub id: ChunkId,
    pub text: String,
    pub meta: DocMeta,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "H", alias = "Homme", alias = "M")]
    Male,
    #[serde(rename = "F", alias = "Femme")]
    Female,
}

/// Raw vital signs as entered. All fields optional; substitution of missing
/// values happens once, in [`crate::features::ClinicalFeatures`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Heart rate, bpm.
    #[serde(default)]
    pub fc: Option<f32>,
    /// Respiratory rate, cycles/min.
    #[serde(default)]
    pub fr: Option<f32>,
    /// Oxygen saturation, %.
    #[serde(default)]
    pub spo2: Option<f32>,
    /// Systolic blood pressure, mmHg.
    #[serde(default)]
    pub ta_systolic: Option<f32>,
    /// Diastolic blood pressure, mmHg.
    #[serde(default)]
    pub ta_diastolic: Option<f32>,
    /// Body temperature, °C.
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Everything known about a patient at decision time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSnapshot {
    #[serde(default)]
    pub age: Option<f32>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub vitals: VitalSigns,
}

/// The one record a serving request produces.
///
/// When `method` is rule-override, `confidence` is 1.0 and `probabilities`
/// is one-hot on `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageDecision {
    pub severity: Severity,
    pub confidence: f32,
    pub probabilities: BTreeMap<Severity, f32>,
    pub red_flags: Vec<String>,
    pub justification: String,
    pub rag_sources: Vec<String>,
    pub method: DecisionMethod,
}

impl TriageDecision {
    /// One-hot probability map on `severity`.
    pub fn one_hot(severity: Severity) -> BTreeMap<Severity, f32> {
        CLASS_ORDER
            .iter()
            .map(|&s| (s, if s == severity { 1.0 } else { 0.0 }))
            .collect()
    }
}
