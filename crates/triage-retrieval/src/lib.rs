//! Retrieval orchestration over the vector index: single and multi-query
//! search, threshold filtering, token-budgeted context assembly, and the
//! triage-specific query expansion from out-of-range vitals.
//!
//! Scores are cosine distances throughout: **lower = more similar**. Every
//! comparison in this crate reads that way; a higher-passes filter would be
//! an incorrect reading of the same number.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use triage_core::types::{RetrievalHit, VitalSigns};
use triage_index::VectorIndex;

/// Returned when no relevant document exists for a query.
pub const EMPTY_CONTEXT: &str =
    "Aucun document pertinent trouvé dans la base de connaissances.";

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    /// Maximum cosine distance for [`RetrievalOrchestrator::filter_by_threshold`].
    pub score_threshold: f32,
    /// Context budget in approximate tokens (1 token ≈ 4 chars).
    pub max_context_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            score_threshold: 0.7,
            max_context_tokens: 1000,
        }
    }
}

/// Formatted context plus the human-readable source labels that produced it.
#[derive(Debug, Clone)]
pub struct TriageContext {
    pub context: String,
    pub sources: Vec<String>,
}

pub struct RetrievalOrchestrator {
    index: VectorIndex,
    cfg: RetrievalConfig,
}

impl RetrievalOrchestrator {
    pub fn new(index: VectorIndex, cfg: RetrievalConfig) -> Self {
        Self { index, cfg }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.cfg
    }

    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievalHit>> {
        let k = top_k.unwrap_or(self.cfg.default_top_k);
        self.index.search(query, k, None).await
    }

    pub async fn retrieve_with_scores(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<(RetrievalHit, f32)>> {
        let hits = self.retrieve(query, top_k).await?;
        Ok(hits
            .into_iter()
            .map(|h| {
                let score = h.score;
                (h, score)
            })
            .collect())
    }

    /// Keep hits with `score <= threshold`. Cosine distance: a LOWER score
    /// means a MORE similar document, so passing hits sit below the bar.
    pub fn filter_by_threshold(
        &self,
        hits: Vec<RetrievalHit>,
        threshold: Option<f32>,
    ) -> Vec<RetrievalHit> {
        let bar = threshold.unwrap_or(self.cfg.score_threshold);
        hits.into_iter().filter(|h| h.score <= bar).collect()
    }

    /// Greedily concatenate `"[i] source (page N):\ntext"` entries under an
    /// approximate token budget (chars / 4, with a small safety margin).
    /// Once the budget would be exceeded the current entry is truncated with
    /// an ellipsis and assembly stops.
    pub fn format_context(&self, hits: &[RetrievalHit], max_tokens: usize) -> String {
        if hits.is_empty() {
            return EMPTY_CONTEXT.to_string();
        }

        let max_chars = max_tokens * 4;
        let mut parts: Vec<String> = Vec::new();
        let mut current = 0usize;

        for (i, hit) in hits.iter().enumerate() {
            let source = hit
                .meta
                .source
                .rsplit('/')
                .next()
                .unwrap_or(&hit.meta.source);
            let page_info = hit
                .meta
                .page
                .map(|p| format!(" (page {p})"))
                .unwrap_or_default();
            let entry = format!("[{}] {}{}:\n{}\n", i + 1, source, page_info, hit.text);

            if current + entry.chars().count() > max_chars {
                let remaining = max_chars.saturating_sub(current + 50);
                if remaining > 100 {
                    let truncated: String = entry.chars().take(remaining).collect();
                    parts.push(format!("{truncated}...\n"));
                }
                break;
            }
            current += entry.chars().count();
            parts.push(entry);
        }

        parts.join("\n")
    }

    /// Run one retrieve per query and merge into unique entries keyed by
    /// chunk id (or a text prefix when the id is empty). A key collision
    /// keeps the entry with the lower distance. The merged list comes back
    /// sorted ascending for the caller to truncate.
    pub async fn multi_query_retrieve(
        &self,
        queries: &[String],
        top_k_per_query: usize,
    ) -> Result<Vec<RetrievalHit>> {
        let mut merged: HashMap<String, RetrievalHit> = HashMap::new();

        for query in queries {
            let hits = self.retrieve(query, Some(top_k_per_query)).await?;
            for hit in hits {
                let key = if hit.id.is_empty() {
                    hit.text.chars().take(50).collect()
                } else {
                    hit.id.clone()
                };
                merged
                    .entry(key)
                    .and_modify(|existing| {
                        if hit.score < existing.score {
                            *existing = hit.clone();
                        }
                    })
                    .or_insert(hit);
            }
        }

        let mut unique: Vec<RetrievalHit> = merged.into_values().collect();
        unique.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!(queries = queries.len(), unique = unique.len(), "multi-query retrieval");
        Ok(unique)
    }

    /// Triage entry point: one query per symptom plus derived queries for
    /// out-of-range vitals, merged, truncated to `top_k`, formatted.
    pub async fn retrieve_for_triage(
        &self,
        symptoms: &[String],
        vitals: &VitalSigns,
        top_k: usize,
    ) -> Result<TriageContext> {
        let mut queries: Vec<String> = symptoms.to_vec();
        queries.extend(derived_vital_queries(vitals));

        let mut hits = self.multi_query_retrieve(&queries, 3).await?;
        hits.truncate(top_k);

        let mut sources: Vec<String> = Vec::new();
        for hit in &hits {
            let label = hit
                .meta
                .title
                .clone()
                .unwrap_or_else(|| hit.meta.source.clone());
            if !sources.contains(&label) {
                sources.push(label);
            }
        }

        let context = self.format_context(&hits, self.cfg.max_context_tokens);
        Ok(TriageContext { context, sources })
    }
}

/// Fixed threshold table mapping out-of-range vitals to reference queries.
pub fn derived_vital_queries(vitals: &VitalSigns) -> Vec<String> {
    let mut queries = Vec::new();

    if let Some(fc) = vitals.fc {
        if fc > 100.0 {
            queries.push("tachycardie fréquence cardiaque élevée".to_string());
        } else if fc < 60.0 {
            queries.push("bradycardie fréquence cardiaque basse".to_string());
        }
    }
    if let Some(spo2) = vitals.spo2 {
        if spo2 < 95.0 {
            queries.push("désaturation hypoxie SpO2 basse".to_string());
        }
    }
    if let Some(temp) = vitals.temperature {
        if temp > 38.5 {
            queries.push("fièvre hyperthermie température élevée".to_string());
        }
    }
    if let Some(tas) = vitals.ta_systolic {
        let tas = triage_core::features::normalize_systolic(tas);
        if tas > 140.0 {
            queries.push("hypertension tension artérielle élevée".to_string());
        } else if tas < 90.0 {
            queries.push("hypotension choc tension basse".to_string());
        }
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vital_queries_cover_the_threshold_table() {
        let vitals = VitalSigns {
            fc: Some(120.0),
            spo2: Some(92.0),
            temperature: Some(39.0),
            ta_systolic: Some(85.0),
            ..VitalSigns::default()
        };
        let queries = derived_vital_queries(&vitals);
        assert_eq!(queries.len(), 4);
        assert!(queries.iter().any(|q| q.contains("tachycardie")));
        assert!(queries.iter().any(|q| q.contains("hypoxie")));
        assert!(queries.iter().any(|q| q.contains("fièvre")));
        assert!(queries.iter().any(|q| q.contains("hypotension")));
    }

    #[test]
    fn normal_vitals_derive_nothing() {
        let vitals = VitalSigns {
            fc: Some(72.0),
            fr: Some(14.0),
            spo2: Some(99.0),
            ta_systolic: Some(118.0),
            ta_diastolic: Some(76.0),
            temperature: Some(36.8),
        };
        assert!(derived_vital_queries(&vitals).is_empty());
    }

    #[test]
    fn missing_vitals_derive_nothing() {
        assert!(derived_vital_queries(&VitalSigns::default()).is_empty());
    }

    #[test]
    fn shorthand_blood_pressure_is_normalized_first() {
        // "8" entered for 80 mmHg systolic: hypotension, not silence.
        let vitals = VitalSigns {
            ta_systolic: Some(8.0),
            ..VitalSigns::default()
        };
        let queries = derived_vital_queries(&vitals);
        assert!(queries.iter().any(|q| q.contains("hypotension")));
    }
}
