use thiserror::Error;

/// Errors surfaced by the library crates.
///
/// Serving-time degradation (empty index, missing classifier artifact) is
/// deliberately not here: those are modeled as outcome values so the
/// decision combiner branches on them instead of catching errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal at construction: bad paths, dimension mismatches, malformed
    /// model artifacts.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A single source document could not be read or parsed. Callers skip
    /// the document and continue the batch.
    #[error("Unreadable content in {file}: {reason}")]
    Content { file: String, reason: String },

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
