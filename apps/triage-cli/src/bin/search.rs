use std::env;

use triage_core::config::{expand_path, Config};
use triage_embed::provider_from_config;
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

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <query> [--limit N] [--threshold T]", args[0]);
        eprintln!("Example: {} 'douleur thoracique' --limit 5", args[0]);
        std::process::exit(1);
    }
    let query = &args[1];
    let mut limit: Option<usize> = None;
    let mut threshold: Option<f32> = None;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" => {
                if let Some(l) = args.get(i + 1).and_then(|v| v.parse().ok()) {
                    limit = Some(l);
                    i += 1;
                } else {
                    eprintln!("Error: --limit requires a number");
                    std::process::exit(1);
                }
            }
            "--threshold" => {
                if let Some(t) = args.get(i + 1).and_then(|v| v.parse().ok()) {
                    threshold = Some(t);
                    i += 1;
                } else {
                    eprintln!("Error: --threshold requires a number");
                    std::process::exit(1);
                }
            }
            other => eprintln!("Warning: ignoring unknown flag {other}"),
        }
        i += 1;
    }

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

    let hits = orchestrator.retrieve(query, limit).await?;
    let hits = orchestrator.filter_by_threshold(hits, threshold);

    println!("Found {} results for: \"{query}\"", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let page = hit
            .meta
            .page
            .map(|p| format!(" (page {p})"))
            .unwrap_or_default();
        println!(
            "\n  {}. distance={:.4}  source={}{}",
            i + 1,
            hit.score,
            hit.meta.source,
            page
        );
        let preview: String = hit.text.chars().take(200).collect();
        println!("     {preview}");
    }
    Ok(())
}
