//! Error taxonomy for the retrieval core.
//!
//! Build-time structural errors ([`RetrieverError::DimensionMismatch`],
//! [`RetrieverError::EmbeddingDimensionMismatch`]) abort the operation that
//! raised them. [`RetrieverError::PersistenceRead`] is consumed by the index
//! builder and turned into a rebuild. [`RetrieverError::OutOfRange`] is
//! returned by direct store lookups; the query path drops such candidates
//! instead of surfacing it.

use crate::retrieval::index_state::BuilderState;
use quarry_embed::EmbedError;
use quarry_ingest::IngestError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RetrieverError>;

#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// A vector's length disagrees with the index dimension
    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider produced a vector of the wrong length during a rebuild
    #[error(
        "Embedding dimension mismatch for document {document}: index expects {expected}, provider returned {actual}"
    )]
    EmbeddingDimensionMismatch {
        document: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Embedding provider returned {actual} vectors for {expected} texts")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    /// Persisted index or sidecar could not be read back
    #[error("Failed to read persisted state from {path}: {reason}")]
    PersistenceRead { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {source}")]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Row {index} is out of range for a store of {len} documents")]
    OutOfRange { index: usize, len: usize },

    /// Vector index and document store have different lengths
    #[error("Vector index has {index_rows} rows but document store has {store_len} documents")]
    Misaligned { index_rows: usize, store_len: usize },

    #[error("Index is not ready for queries (state: {state})")]
    NotReady { state: BuilderState },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Background task failed: {source}")]
    Task {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl RetrieverError {
    pub fn persistence_read(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::PersistenceRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
