//! Document ingestion for quarry.
//!
//! Turns a directory of text and PDF files into the ordered `(text, metadata)` pairs
//! the index builder consumes, optionally splitting long files into
//! overlapping chunks first.

pub mod corpus;
pub mod error;
pub mod pdf;
pub mod text;

pub use corpus::{
    ChunkingOptions, CorpusSource, DirectoryCorpus, InMemoryCorpus, SUPPORTED_EXTENSIONS,
    SourceDocument,
};
pub use error::{IngestError, Result};
pub use text::{TextChunk, TextSplitter};
