//! Status reporting for the live index and for the files on disk.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::retrieval::index_builder::{IndexBuilder, load_persisted};
use crate::retrieval::index_state::BuilderState;
use crate::storage::{IndexPaths, VectorIndex};

/// State of a running index builder
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    /// Builder state at the time of the call
    pub state: BuilderState,
    /// Rows in the served snapshot (absent before the first snapshot)
    pub rows: Option<usize>,
    /// Vector dimension, taken from the embedding provider
    pub dimension: usize,
    /// Embedding provider name
    pub provider: String,
    /// Where documents are loaded from on rebuild
    pub corpus: String,
    pub index_path: PathBuf,
    pub store_path: PathBuf,
    /// When the served index was written
    pub built_at: Option<DateTime<Utc>>,
    /// Hex blake3 fingerprint of the served document store
    pub store_fingerprint: Option<String>,
}

/// What is on disk, checked without an embedding provider
#[derive(Debug, Clone, Serialize)]
pub struct PersistedStatus {
    pub index_path: PathBuf,
    pub store_path: PathBuf,
    pub index_exists: bool,
    pub store_exists: bool,
    /// Size of the index file in bytes
    pub index_size_bytes: Option<u64>,
    /// Rows recorded in the index header
    pub rows: Option<usize>,
    pub dimension: Option<usize>,
    pub built_at: Option<DateTime<Utc>>,
    pub store_fingerprint: Option<String>,
    /// Whether the pair would be served as-is on startup
    pub loadable: bool,
    /// Why the pair would be rebuilt instead
    pub rebuild_reason: Option<String>,
}

/// Status queries
pub struct StatusApi;

impl StatusApi {
    /// Status of a builder and the snapshot it is serving.
    pub async fn index_status(builder: &IndexBuilder) -> IndexStatus {
        let handle = builder.handle();
        let state = handle.state().await;
        let snapshot = handle.snapshot().await;

        IndexStatus {
            state,
            rows: snapshot.as_ref().map(|s| s.len()),
            dimension: builder.dimension(),
            provider: builder.provider_name().to_string(),
            corpus: builder.corpus_description(),
            index_path: builder.paths().index_path.clone(),
            store_path: builder.paths().store_path.clone(),
            built_at: snapshot
                .as_ref()
                .and_then(|s| s.index().built_at())
                .and_then(timestamp),
            store_fingerprint: snapshot
                .as_ref()
                .and_then(|s| s.index().store_fingerprint())
                .map(hex::encode),
        }
    }

    /// Inspect the persisted pair at `paths`.
    ///
    /// With `dimension` set the pair is checked exactly as startup would check
    /// it; without one the index's own dimension is assumed.
    pub fn persisted_status(paths: &IndexPaths, dimension: Option<usize>) -> PersistedStatus {
        let index = VectorIndex::load(&paths.index_path).ok();
        let check_dimension = dimension
            .or(index.as_ref().map(VectorIndex::dimension))
            .unwrap_or_default();

        let (loadable, rebuild_reason) = match load_persisted(paths, check_dimension) {
            Ok(_) => (true, None),
            Err(reason) => (false, Some(reason.to_string())),
        };

        PersistedStatus {
            index_path: paths.index_path.clone(),
            store_path: paths.store_path.clone(),
            index_exists: paths.index_path.is_file(),
            store_exists: paths.store_path.is_file(),
            index_size_bytes: std::fs::metadata(&paths.index_path).ok().map(|m| m.len()),
            rows: index.as_ref().map(VectorIndex::len),
            dimension: index.as_ref().map(VectorIndex::dimension),
            built_at: index
                .as_ref()
                .and_then(VectorIndex::built_at)
                .and_then(timestamp),
            store_fingerprint: index
                .as_ref()
                .and_then(VectorIndex::store_fingerprint)
                .map(hex::encode),
            loadable,
            rebuild_reason,
        }
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
