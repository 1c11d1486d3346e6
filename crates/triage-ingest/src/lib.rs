//! Document ingestion: loaders for the supported source formats and the
//! character-window chunker that feeds the vector index.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod loader;

pub use chunker::{chunk_document, chunk_documents, ChunkingConfig};
pub use loader::{load_directory, load_path, preprocess_text, IngestionSummary};
