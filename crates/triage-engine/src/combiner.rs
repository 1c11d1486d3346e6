//! Decision combiner. Safety rules run first; the classifier is consulted
//! only when no rule fired; retrieval enriches whichever path decided.
//!
//! `decide` never fails. A broken classifier or an unreachable index
//! degrades the decision to the fallback heuristic or the canned
//! recommendation, and the degradation stays visible through `method`
//! and the logs.

use std::fmt::Write as _;

use tracing::{info, warn};
use triage_core::features::ClinicalFeatures;
use triage_core::types::{
    DecisionMethod, PatientSnapshot, Severity, TriageDecision,
};
use triage_retrieval::RetrievalOrchestrator;

use crate::classifier::SeverityClassifier;
use crate::rules::SafetyRuleEngine;

/// Longest recommendation block surfaced in a justification.
const MAX_RECOMMENDATION_CHARS: usize = 400;
const MAX_RECOMMENDATION_LINES: usize = 15;

pub struct TriageEngine {
    orchestrator: RetrievalOrchestrator,
    classifier: Option<SeverityClassifier>,
    rules: SafetyRuleEngine,
}

impl TriageEngine {
    /// `classifier` is optional: without it, decisions fall back to the
    /// symptom heuristic rather than refusing to answer.
    pub fn new(orchestrator: RetrievalOrchestrator, classifier: Option<SeverityClassifier>) -> Self {
        Self {
            orchestrator,
            classifier,
            rules: SafetyRuleEngine::new(),
        }
    }

    /// Produces the triage decision for one patient snapshot.
    ///
    /// Any red flag forces ROUGE with confidence 1.0; the classifier is
    /// consulted only when no rule fired.
    pub async fn decide(&self, patient: &PatientSnapshot) -> TriageDecision {
        let red_flags = self.rules.evaluate(patient);

        let (severity, confidence, probabilities, method) = if red_flags.is_empty() {
            match &self.classifier {
                Some(classifier) => {
                    let outcome = classifier.predict(patient);
                    (
                        outcome.severity,
                        outcome.confidence,
                        outcome.probabilities,
                        DecisionMethod::Classifier,
                    )
                }
                None => {
                    warn!("no classifier loaded, using symptom heuristic");
                    let severity = fallback_severity(patient, &red_flags);
                    (
                        severity,
                        0.5,
                        TriageDecision::one_hot(severity),
                        DecisionMethod::Fallback,
                    )
                }
            }
        } else {
            info!(flags = red_flags.len(), "red flags present, forcing ROUGE");
            (
                Severity::Rouge,
                1.0,
                TriageDecision::one_hot(Severity::Rouge),
                DecisionMethod::RuleOverride,
            )
        };

        let (recommendation, mut rag_sources) =
            self.recommendation_for(patient, severity, &red_flags).await;
        rag_sources.insert(0, format!("Protocoles {severity}"));

        let justification =
            build_justification(patient, severity, &red_flags, &recommendation);

        TriageDecision {
            severity,
            confidence,
            probabilities,
            red_flags,
            justification,
            rag_sources,
            method,
        }
    }

    /// Pulls protocol text for the decided severity. Seeds the retrieval
    /// with the severity level itself so protocol documents rank alongside
    /// symptom matches.
    async fn recommendation_for(
        &self,
        patient: &PatientSnapshot,
        severity: Severity,
        red_flags: &[String],
    ) -> (String, Vec<String>) {
        let mut queries = vec![format!("protocole niveau {severity}")];
        queries.extend(patient.symptoms.iter().take(2).cloned());
        if let Some(flag) = red_flags.first() {
            queries.push(flag.clone());
        }

        let top_k = self.orchestrator.config().default_top_k;
        match self
            .orchestrator
            .retrieve_for_triage(&queries, &patient.vitals, top_k)
            .await
        {
            Ok(ctx) => {
                if ctx.context == triage_retrieval::EMPTY_CONTEXT {
                    return (default_recommendation(severity).to_string(), ctx.sources);
                }
                let cleaned = clean_context(&ctx.context);
                if cleaned.chars().count() < 50 {
                    (default_recommendation(severity).to_string(), ctx.sources)
                } else {
                    (cleaned, ctx.sources)
                }
            }
            Err(e) => {
                warn!(error = %e, "retrieval failed, using canned recommendation");
                (default_recommendation(severity).to_string(), Vec::new())
            }
        }
    }
}

/// Heuristic used when no classifier is available and no rule fired.
fn fallback_severity(patient: &PatientSnapshot, red_flags: &[String]) -> Severity {
    if red_flags.len() >= 3 {
        Severity::Rouge
    } else if !red_flags.is_empty() {
        Severity::Jaune
    } else if !patient.symptoms.is_empty() {
        Severity::Vert
    } else {
        Severity::Gris
    }
}

/// Strips headings, citations and noise lines from retrieved context so a
/// justification reads as advice, not as a search dump.
fn clean_context(context: &str) -> String {
    let mut lines = Vec::new();
    for line in context.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            continue;
        }
        if trimmed.chars().count() > 20
            || trimmed.starts_with('-')
            || trimmed.starts_with('•')
        {
            lines.push(trimmed.to_string());
        }
        if lines.len() >= MAX_RECOMMENDATION_LINES {
            break;
        }
    }
    let joined = lines.join("\n");
    if joined.chars().count() > MAX_RECOMMENDATION_CHARS {
        let cut: String = joined.chars().take(MAX_RECOMMENDATION_CHARS).collect();
        format!("{cut}...")
    } else {
        joined
    }
}

fn default_recommendation(severity: Severity) -> &'static str {
    match severity {
        Severity::Rouge => {
            "Urgence vitale: appeler SMUR, surveillance continue, ne pas attendre."
        }
        Severity::Jaune => {
            "Urgence: consultation dans l'heure, surveiller constantes, réévaluer rapidement."
        }
        Severity::Vert => "Non urgent: consultation dans 24-48h, surveillance domicile possible.",
        Severity::Gris => "Pas d'urgence: RDV médecin traitant, conseils généraux.",
    }
}

fn build_justification(
    patient: &PatientSnapshot,
    severity: Severity,
    red_flags: &[String],
    recommendation: &str,
) -> String {
    let f = ClinicalFeatures::from_snapshot(patient);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "## Niveau de triage : {severity} ({})\n",
        severity.label()
    );

    if !red_flags.is_empty() {
        out.push_str("**Signes de gravité détectés :**\n");
        for flag in red_flags {
            let _ = writeln!(out, "- {flag}");
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "**Constantes :** FC {:.0} bpm, FR {:.0}/min, SpO2 {:.0}%, TA {:.0}/{:.0} mmHg, T° {:.1}°C, âge {:.0} ans\n",
        f.fc(),
        f.fr(),
        f.spo2(),
        f.ta_systolic(),
        f.ta_diastolic(),
        f.temperature(),
        f.age(),
    );

    if !patient.symptoms.is_empty() {
        let _ = writeln!(out, "**Symptômes :** {}\n", patient.symptoms.join(", "));
    }

    out.push_str("**Recommandations :**\n");
    out.push_str(recommendation);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::types::VitalSigns;

    #[test]
    fn fallback_heuristic_ladder() {
        let mut patient = PatientSnapshot::default();
        assert_eq!(fallback_severity(&patient, &[]), Severity::Gris);

        patient.symptoms = vec!["toux".to_string()];
        assert_eq!(fallback_severity(&patient, &[]), Severity::Vert);

        let one = vec!["flag".to_string()];
        assert_eq!(fallback_severity(&patient, &one), Severity::Jaune);

        let three = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(fallback_severity(&patient, &three), Severity::Rouge);
    }

    #[test]
    fn clean_context_drops_headers_and_caps_length() {
        let raw = "[1] proto.txt:\n# Titre\nPrendre en charge immédiatement le patient en détresse.\n- oxygénothérapie\nok\n";
        let cleaned = clean_context(raw);
        assert!(!cleaned.contains("[1]"));
        assert!(!cleaned.contains("# Titre"));
        assert!(cleaned.contains("oxygénothérapie"));
        assert!(!cleaned.contains("\nok"));

        let long = "ligne de protocole suffisamment longue pour être conservée ici\n".repeat(30);
        let capped = clean_context(&long);
        assert!(capped.chars().count() <= MAX_RECOMMENDATION_CHARS + 3);
        assert!(capped.ends_with("..."));
    }

    #[test]
    fn justification_mentions_level_and_vitals() {
        let patient = PatientSnapshot {
            age: Some(62.0),
            symptoms: vec!["douleur thoracique".to_string()],
            vitals: VitalSigns {
                spo2: Some(88.0),
                ..VitalSigns::default()
            },
            ..PatientSnapshot::default()
        };
        let text = build_justification(
            &patient,
            Severity::Rouge,
            &["Hypoxie sévère (SpO2 < 90%)".to_string()],
            "Appeler le SMUR sans délai.",
        );
        assert!(text.contains("ROUGE"));
        assert!(text.contains("URGENCE VITALE"));
        assert!(text.contains("SpO2 88"));
        assert!(text.contains("douleur thoracique"));
        assert!(text.contains("Hypoxie sévère"));
        assert!(text.contains("Appeler le SMUR"));
    }
}
