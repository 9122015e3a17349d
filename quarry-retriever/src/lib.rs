//! quarry-retriever: exact vector retrieval over a persisted document index
//!
//! Documents from a corpus are embedded once, stored as a flat vector index
//! plus an aligned JSON sidecar, and queried by exact squared-L2 nearest
//! neighbour search.
//!
//! ## Key Modules
//!
//! - **[`storage`]**: vector index, document store and their paired persistence
//! - **[`retrieval`]**: the load-or-rebuild builder and the query service
//! - **[`status`]**: status of a running builder or of the files on disk
//! - **[`config`]**: TOML configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quarry_embed::{EmbedConfig, FastEmbedProvider};
//! use quarry_ingest::DirectoryCorpus;
//! use quarry_retriever::retrieval::{IndexBuilder, RetrievalConfig, RetrievalService};
//! use quarry_retriever::storage::IndexPaths;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = Arc::new(FastEmbedProvider::create(EmbedConfig::default()).await?);
//! let corpus = Arc::new(DirectoryCorpus::new("data"));
//!
//! let builder = IndexBuilder::new(
//!     provider.clone(),
//!     corpus,
//!     IndexPaths::from_index_path("index/docs.index"),
//! );
//! builder.start().await?;
//!
//! let service = RetrievalService::new(builder.handle(), provider, RetrievalConfig::default());
//! for doc in service.search("What is the travel policy?").await? {
//!     println!("{:?} {:.3}", doc.source(), doc.similarity_score().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! CorpusSource → IndexBuilder → EmbeddingProvider
//!                    ↓
//!       VectorIndex + DocumentStore → docs.index / docs.store.json
//!                    ↓
//!               IndexHandle ← RetrievalService ← queries
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod status;
pub mod storage;

pub use error::{Result, RetrieverError};
