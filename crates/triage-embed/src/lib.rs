//! Embedding capability consumed by the vector index.
//!
//! Two backends: a deterministic hashed embedder for tests and offline
//! runs, and a local transformer encoder loaded through candle. The
//! backend is chosen by configuration at construction; nothing in the
//! serving path inspects types at runtime.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod device;
pub mod hashed;
pub mod local;

use triage_core::config::Config;
use triage_core::error::{Error, Result};

pub use hashed::HashedEmbedder;
pub use local::LocalModel;

pub trait EmbeddingProvider: Send + Sync {
    /// Declared output dimension. The index validates stored vectors
    /// against this at construction time.
    fn dim(&self) -> usize;
    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Build the configured provider.
///
/// `TRIAGE_USE_HASHED_EMBEDDINGS=1` forces the hashed backend regardless of
/// configuration; tests and CI rely on this switch.
pub fn provider_from_config(cfg: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    let forced = std::env::var("TRIAGE_USE_HASHED_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let backend: String = if forced {
        "hashed".to_string()
    } else {
        cfg.get_or("embedding.backend", "hashed".to_string())
    };

    match backend.as_str() {
        "hashed" => {
            let dim: usize = cfg.get_or("embedding.hashed_dim", hashed::DEFAULT_DIM);
            tracing::info!(dim, "using hashed embedding backend");
            Ok(Box::new(HashedEmbedder::new(dim)))
        }
        "local" => {
            let model_dir = cfg
                .get::<String>("embedding.model_dir")
                .map_err(|e| Error::InvalidConfig(e.to_string()))?;
            let model = LocalModel::load(triage_core::config::expand_path(&model_dir))?;
            tracing::info!(dim = model.dim(), model_dir, "using local embedding backend");
            Ok(Box::new(model))
        }
        other => Err(Error::InvalidConfig(format!(
            "unknown embedding backend '{other}' (expected 'hashed' or 'local')"
        ))),
    }
}
