//! Persistent vector index over reference chunks, backed by LanceDB.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod schema;
pub mod store;

pub use store::{IndexStats, VectorIndex};
