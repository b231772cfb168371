//! File-backed stores for the support agent: the read-only product
//! catalog, the mutable order ledger, and the two vector indexes.
//!
//! The catalog and the indexes are immutable after load and safe to share
//! behind an `Arc`. The ledger is the only mutable store; its mutations
//! are serialized behind a single lock and written through to a working
//! copy file after every change.

use std::path::PathBuf;

use thiserror::Error;

pub mod catalog;
pub mod fuzzy;
pub mod ledger;
pub mod vector;

pub use catalog::CatalogStore;
pub use fuzzy::partial_ratio;
pub use ledger::{MutationError, MutationReceipt, OrderLedger};
pub use vector::{Embedder, SimilarityHit, VectorIndex, VectorRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not read data file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse data file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("could not encode ledger for persistence: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("could not persist working copy `{path}`: {source}")]
    Persist { path: PathBuf, source: std::io::Error },
}
