//! LanceDB-backed vector index over reference chunks.
//!
//! Ingestion embeds a whole batch before any write and inserts it as one
//! record batch, so a failed call never leaves a half-indexed batch
//! visible. Serving is read-only and safe under concurrent callers.

use std::path::Path;

use anyhow::Result;
use arrow_array::{Array, Float32Array, Int32Array, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};
use tracing::{debug, info};

use triage_core::error::Error;
use triage_core::types::{Chunk, RetrievalHit};
use triage_embed::EmbeddingProvider;

use crate::schema::{build_chunk_schema, chunks_to_record_batch, meta_from_row, vector_dim};

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub rows: usize,
    pub table: String,
    pub db_dir: String,
}

pub struct VectorIndex {
    db: Connection,
    db_dir: String,
    table_name: String,
    provider: Box<dyn EmbeddingProvider>,
    dim: usize,
}

impl VectorIndex {
    /// Connect and validate. If the table already exists, its vector column
    /// dimension must match the provider's declared dimension; a mismatch
    /// is fatal here rather than a query-time surprise.
    pub async fn open(
        db_dir: &Path,
        table_name: &str,
        provider: Box<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let db = connect(db_dir.to_string_lossy().as_ref()).execute().await?;
        let dim = provider.dim();

        let names = db.table_names().execute().await?;
        if names.contains(&table_name.to_string()) {
            let table = db.open_table(table_name).execute().await?;
            let schema = table.schema().await?;
            if let Some(stored) = vector_dim(&schema) {
                if stored != dim {
                    return Err(Error::InvalidConfig(format!(
                        "index table '{table_name}' stores {stored}-dim vectors but the \
                         embedding provider declares {dim}"
                    ))
                    .into());
                }
            }
        }

        Ok(Self {
            db,
            db_dir: db_dir.to_string_lossy().to_string(),
            table_name: table_name.to_string(),
            provider,
            dim,
        })
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self.db.table_names().execute().await?;
        Ok(names.contains(&self.table_name))
    }

    /// Index a batch of chunks. Ids are assigned where absent, every text is
    /// embedded in one provider call, and the rows land in a single insert.
    pub async fn add_documents(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut owned: Vec<Chunk> = chunks.to_vec();
        for chunk in &mut owned {
            if chunk.id.is_empty() {
                chunk.id = blake3::hash(chunk.text.as_bytes()).to_hex()[..16].to_string();
            }
        }

        let texts: Vec<String> = owned.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.provider.embed_batch(&texts)?;
        for e in &embeddings {
            if e.len() != self.dim {
                return Err(Error::InvalidConfig(format!(
                    "provider returned a {}-dim vector, expected {}",
                    e.len(),
                    self.dim
                ))
                .into());
            }
        }

        let batch = chunks_to_record_batch(&owned, &embeddings, self.dim as i32)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if self.table_exists().await? {
            let table = self.db.open_table(&self.table_name).execute().await?;
            table.add(reader).execute().await?;
        } else {
            self.db
                .create_table(&self.table_name, reader)
                .execute()
                .await?;
        }
        info!(rows = owned.len(), table = %self.table_name, "indexed chunk batch");
        Ok(owned.len())
    }

    /// Nearest-neighbor search by cosine distance. Results come back sorted
    /// ascending (lower = more similar). An empty or missing table yields an
    /// empty list, never an error.
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        metadata_filter: Option<&str>,
    ) -> Result<Vec<RetrievalHit>> {
        if top_k == 0 || !self.table_exists().await? {
            return Ok(Vec::new());
        }

        let query_vec = self.provider.embed_text(query_text)?;
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut q = table
            .vector_search(query_vec)?
            .distance_type(DistanceType::Cosine)
            .limit(top_k);
        if let Some(filter) = metadata_filter {
            q = q.only_if(filter);
        }
        let mut stream = q.execute().await?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let get_str = |name: &str| -> Option<&StringArray> {
                batch
                    .column_by_name(name)
                    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            };
            let ids = get_str("id").ok_or_else(|| anyhow::anyhow!("missing 'id' column"))?;
            let sources =
                get_str("source").ok_or_else(|| anyhow::anyhow!("missing 'source' column"))?;
            let contents =
                get_str("content").ok_or_else(|| anyhow::anyhow!("missing 'content' column"))?;
            let titles = get_str("title");
            let sections = get_str("section");
            let extras = get_str("extra_json");
            let pages = batch
                .column_by_name("page")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>());
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("missing '_distance' column"))?;

            fn constrain<F>(f: F) -> F
            where
                F: for<'a> Fn(Option<&'a StringArray>) -> Option<&'a str>,
            {
                f
            }
            for i in 0..batch.num_rows() {
                let opt = constrain(move |arr| {
                    arr.and_then(move |a: &StringArray| (!a.is_null(i)).then(|| a.value(i)))
                });
                let page = pages.and_then(|a| (!a.is_null(i)).then(|| a.value(i)));
                hits.push(RetrievalHit {
                    id: ids.value(i).to_string(),
                    text: contents.value(i).to_string(),
                    meta: meta_from_row(
                        sources.value(i),
                        opt(titles),
                        opt(sections),
                        page,
                        opt(extras),
                    ),
                    score: distances.value(i),
                });
            }
        }

        hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        debug!(query = query_text, hits = hits.len(), "vector search");
        Ok(hits)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.table_exists().await? {
            return Ok(());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        table
            .delete(&format!("id = '{}'", id.replace('\'', "''")))
            .await?;
        Ok(())
    }

    /// Entry count and collection identity, for operational visibility.
    pub async fn stats(&self) -> Result<IndexStats> {
        let rows = if self.table_exists().await? {
            let table = self.db.open_table(&self.table_name).execute().await?;
            table.count_rows(None).await?
        } else {
            0
        };
        Ok(IndexStats {
            rows,
            table: self.table_name.clone(),
            db_dir: self.db_dir.clone(),
        })
    }

    /// Create the table eagerly (empty) so stats and search work before the
    /// first batch arrives.
    pub async fn ensure_table(&self) -> Result<()> {
        if self.table_exists().await? {
            return Ok(());
        }
        let schema = build_chunk_schema(self.dim as i32);
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
        self.db
            .create_table(&self.table_name, Box::new(iter))
            .execute()
            .await?;
        Ok(())
    }
}
