use std::{env, fs, path::PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use triage_core::config::{expand_path, Config};
use triage_embed::provider_from_config;
use triage_index::VectorIndex;
use triage_ingest::{chunk_documents, load_directory, ChunkingConfig};

const BATCH_SIZE: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut rebuild = false;
    let mut corpus_dir = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--rebuild" | "-r" => rebuild = true,
            "--help" | "-h" => {
                println!("Usage: triage-indexer [--rebuild] [corpus_dir]");
                return Ok(());
            }
            _ if !args[i].starts_with('-') => corpus_dir = Some(PathBuf::from(&args[i])),
            other => eprintln!("Warning: ignoring unknown flag {other}"),
        }
        i += 1;
    }

    let corpus_dir = corpus_dir.unwrap_or_else(|| {
        expand_path(config.get_or::<String>("data.corpus_dir", "data/corpus".into()))
    });
    let db_dir = expand_path(config.get_or::<String>("data.lancedb_dir", "data/lancedb".into()));
    let table: String = config.get_or("data.table", "medical_chunks".into());

    println!("Triage Knowledge Base Indexer\n=============================");
    println!("Corpus directory: {}", corpus_dir.display());
    println!("Index directory:  {}", db_dir.display());
    if rebuild && db_dir.exists() {
        println!("Rebuilding: removing existing index");
        fs::remove_dir_all(&db_dir)?;
    }
    fs::create_dir_all(&db_dir)?;

    let (documents, summary) = load_directory(&corpus_dir)?;
    println!("{summary}");

    let chunking = ChunkingConfig::new(
        config.get_or("chunking.chunk_size", 500),
        config.get_or("chunking.overlap", 50),
    )?;
    let chunks = chunk_documents(&documents, &chunking);
    println!("Prepared {} chunks", chunks.len());

    if chunks.is_empty() {
        println!("Nothing to index.");
        return Ok(());
    }

    let provider = provider_from_config(&config)?;
    let index = VectorIndex::open(&db_dir, &table, provider).await?;

    let bar = ProgressBar::new(chunks.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} chunks ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let mut inserted = 0usize;
    for batch in chunks.chunks(BATCH_SIZE) {
        inserted += index.add_documents(batch).await?;
        bar.inc(batch.len() as u64);
    }
    bar.finish();

    let stats = index.stats().await?;
    println!("\nIndexing complete: {inserted} chunks inserted, {} rows total", stats.rows);
    println!("To search: cargo run --bin triage-search '<query>'");
    Ok(())
}
