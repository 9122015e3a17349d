//! Index lifecycle and query path.
//!
//! - [`index_state`]: the shared handle readers query through
//! - [`index_builder`]: loads the persisted pair or rebuilds it from the corpus
//! - [`retrieval_service`]: embeds queries and resolves nearest rows to documents

pub mod index_builder;
pub mod index_state;
pub mod retrieval_service;

pub use index_builder::{IndexBuilder, RebuildReason, StartupOutcome, load_persisted};
pub use index_state::{BuilderState, IndexHandle, IndexSnapshot};
pub use retrieval_service::{QueryHit, RetrievalConfig, RetrievalService};
