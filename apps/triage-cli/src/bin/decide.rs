use std::io::Read;
use std::{env, fs};

use triage_core::config::{expand_path, Config};
use triage_core::types::PatientSnapshot;
use triage_embed::provider_from_config;
use triage_engine::{SeverityClassifier, TriageEngine};
use triage_index::VectorIndex;
use triage_retrieval::{RetrievalConfig, RetrievalOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut patient_file = None;
    let mut json_output = false;
    for arg in &args {
        match arg.as_str() {
            "--json" => json_output = true,
            "--help" | "-h" => {
                println!("Usage: triage-decide [--json] [patient.json]");
                println!("Reads a patient snapshot as JSON from the file or from stdin.");
                return Ok(());
            }
            _ if !arg.starts_with('-') => patient_file = Some(arg.clone()),
            other => eprintln!("Warning: ignoring unknown flag {other}"),
        }
    }

    let raw = match patient_file {
        Some(path) => fs::read_to_string(&path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let patient: PatientSnapshot = serde_json::from_str(&raw)?;

    let config = Config::load()?;
    let db_dir = expand_path(config.get_or::<String>("data.lancedb_dir", "data/lancedb".into()));
    let table: String = config.get_or("data.table", "medical_chunks".into());

    let provider = provider_from_config(&config)?;
    let index = VectorIndex::open(&db_dir, &table, provider).await?;
    let retrieval_cfg = RetrievalConfig {
        default_top_k: config.get_or("retrieval.top_k", 5),
        score_threshold: config.get_or("retrieval.score_threshold", 0.7),
        max_context_tokens: config.get_or("retrieval.max_context_tokens", 1000),
    };
    let orchestrator = RetrievalOrchestrator::new(index, retrieval_cfg);

    let model_path = expand_path(config.get_or::<String>(
        "classifier.model_path",
        "models/severity_linear.safetensors".into(),
    ));
    let classifier = match SeverityClassifier::load(&model_path) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("Warning: classifier unavailable ({e}), using fallback heuristic");
            None
        }
    };

    let engine = TriageEngine::new(orchestrator, classifier);
    let decision = engine.decide(&patient).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        println!(
            "Niveau: {} | confiance {:.2} | méthode {}",
            decision.severity,
            decision.confidence,
            decision.method.as_str()
        );
        println!("Action: {}", decision.severity.action());
        if !decision.red_flags.is_empty() {
            println!("Signes de gravité:");
            for flag in &decision.red_flags {
                println!("  - {flag}");
            }
        }
        println!("\n{}", decision.justification);
        if !decision.rag_sources.is_empty() {
            println!("\nSources: {}", decision.rag_sources.join(", "));
        }
    }
    Ok(())
}
