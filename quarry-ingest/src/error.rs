//! Error types for corpus loading

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The corpus root does not exist or is not a directory
    #[error("Corpus directory not found: {path}")]
    MissingRoot { path: PathBuf },

    /// Walking the corpus directory failed
    #[error("Failed to walk corpus directory: {source}")]
    Walk {
        #[from]
        source: ignore::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A PDF could not be parsed
    #[error("Failed to parse PDF {path}: {source}")]
    Pdf {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    /// A blocking extraction task panicked or was cancelled
    #[error("Extraction task failed: {source}")]
    Task {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("Invalid chunking settings: {message}")]
    InvalidChunking { message: String },

    #[error("Invalid delimiter pattern {pattern:?}: {source}")]
    InvalidDelimiter {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
