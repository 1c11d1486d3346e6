//! Decision layer: deterministic safety rules in front of a linear
//! severity classifier, combined into the final triage decision.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod classifier;
pub mod combiner;
pub mod rules;

pub use classifier::{ClassifierOutcome, SeverityClassifier};
pub use combiner::TriageEngine;
pub use rules::SafetyRuleEngine;
