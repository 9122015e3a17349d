//! Load-or-rebuild orchestration for the persisted index.
//!
//! On [`IndexBuilder::start`] the builder tries to load the persisted index and
//! sidecar. The pair is only served if both files read cleanly, the index
//! dimension matches the embedding provider, both are non-empty, their lengths
//! match, and the index header's sidecar fingerprint matches the sidecar on
//! disk. Any other outcome is a [`RebuildReason`] and leads to a full rebuild
//! from the corpus. Nothing is ever repaired in place.
//!
//! ```text
//! Unloaded ──start──▶ Loading ──ok──────────────▶ Ready
//!                        │                          ▲
//!                        └──reason──▶ Rebuilding ───┘
//! ```
//!
//! A rebuild embeds every document, checks each vector against the index
//! dimension, and only then persists the pair and publishes the snapshot. A
//! failed rebuild persists nothing and leaves the previous snapshot in place.

use crate::error::{Result, RetrieverError};
use crate::retrieval::index_state::{BuilderState, IndexHandle, IndexSnapshot};
use crate::storage::{Document, DocumentStore, IndexPaths, VectorIndex, write_aligned_pair};
use quarry_embed::EmbeddingProvider;
use quarry_ingest::CorpusSource;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DEFAULT_BATCH_SIZE: usize = 32;

/// Why persisted state was not served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    /// Index or sidecar file does not exist
    MissingFiles,
    /// A file exists but could not be read or decoded
    ReadFailure { reason: String },
    EmptyIndex,
    EmptyStore,
    RowCountMismatch { index_rows: usize, store_len: usize },
    /// The sidecar is not the one the index was built with
    StaleStore,
    /// The index was built for a different embedding dimension
    DimensionChanged { persisted: usize, expected: usize },
    /// Requested explicitly
    Forced,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::MissingFiles => write!(f, "persisted files are missing"),
            RebuildReason::ReadFailure { reason } => write!(f, "failed to read persisted state: {reason}"),
            RebuildReason::EmptyIndex => write!(f, "persisted index has no rows"),
            RebuildReason::EmptyStore => write!(f, "persisted document store is empty"),
            RebuildReason::RowCountMismatch {
                index_rows,
                store_len,
            } => write!(
                f,
                "index has {index_rows} rows but store has {store_len} documents"
            ),
            RebuildReason::StaleStore => write!(f, "document store does not match the index fingerprint"),
            RebuildReason::DimensionChanged {
                persisted,
                expected,
            } => write!(
                f,
                "index dimension {persisted} differs from provider dimension {expected}"
            ),
            RebuildReason::Forced => write!(f, "rebuild requested"),
        }
    }
}

/// How [`IndexBuilder::start`] reached `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    Loaded { rows: usize },
    Rebuilt { reason: RebuildReason, rows: usize },
}

impl StartupOutcome {
    pub fn rows(&self) -> usize {
        match self {
            StartupOutcome::Loaded { rows } | StartupOutcome::Rebuilt { rows, .. } => *rows,
        }
    }
}

/// Check the persisted pair at `paths` and return it if it can be served.
///
/// This is the whole `Loading` decision; it does no writes.
pub fn load_persisted(
    paths: &IndexPaths,
    dimension: usize,
) -> std::result::Result<IndexSnapshot, RebuildReason> {
    if !paths.exist() {
        return Err(RebuildReason::MissingFiles);
    }

    let read_failure = |e: RetrieverError| RebuildReason::ReadFailure {
        reason: e.to_string(),
    };
    let index = VectorIndex::load(&paths.index_path).map_err(read_failure)?;
    let (store, store_fp) = DocumentStore::load(&paths.store_path).map_err(read_failure)?;

    if index.dimension() != dimension {
        return Err(RebuildReason::DimensionChanged {
            persisted: index.dimension(),
            expected: dimension,
        });
    }
    if index.is_empty() {
        return Err(RebuildReason::EmptyIndex);
    }
    if store.is_empty() {
        return Err(RebuildReason::EmptyStore);
    }
    if index.len() != store.len() {
        return Err(RebuildReason::RowCountMismatch {
            index_rows: index.len(),
            store_len: store.len(),
        });
    }
    if index.store_fingerprint() != Some(store_fp) {
        return Err(RebuildReason::StaleStore);
    }

    IndexSnapshot::new(index, store).map_err(read_failure)
}

/// Owns the transition from persisted files (or the corpus) to a servable index.
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    corpus: Arc<dyn CorpusSource>,
    paths: IndexPaths,
    handle: IndexHandle,
    dimension: usize,
    batch_size: usize,
    writer: Mutex<()>,
}

impl IndexBuilder {
    /// The index dimension is taken from `provider` here and never changes.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        corpus: Arc<dyn CorpusSource>,
        paths: IndexPaths,
    ) -> Self {
        let dimension = provider.embedding_dimension();
        Self {
            provider,
            corpus,
            paths,
            handle: IndexHandle::new(),
            dimension,
            batch_size: DEFAULT_BATCH_SIZE,
            writer: Mutex::new(()),
        }
    }

    /// Number of documents sent to the provider per call during a rebuild.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Handle for readers; cheap to clone.
    pub fn handle(&self) -> IndexHandle {
        self.handle.clone()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn corpus_description(&self) -> String {
        self.corpus.describe()
    }

    /// Bring the index to `Ready`, loading persisted state or rebuilding.
    ///
    /// Calling this again once ready returns the current row count without
    /// touching disk. If the rebuild fails the handle returns to `Unloaded`
    /// and the error is returned.
    pub async fn start(&self) -> Result<StartupOutcome> {
        let _writer = self.writer.lock().await;

        if let Some(snapshot) = self.handle.snapshot().await {
            debug!("Index already ready with {} rows", snapshot.len());
            return Ok(StartupOutcome::Loaded {
                rows: snapshot.len(),
            });
        }

        self.handle.set_state(BuilderState::Loading).await;
        info!(
            "Loading persisted index from {}",
            self.paths.index_path.display()
        );

        let paths = self.paths.clone();
        let dimension = self.dimension;
        let loaded = tokio::task::spawn_blocking(move || load_persisted(&paths, dimension)).await?;

        match loaded {
            Ok(snapshot) => {
                let rows = snapshot.len();
                self.handle.publish(snapshot).await;
                info!("Loaded index with {} rows", rows);
                Ok(StartupOutcome::Loaded { rows })
            }
            Err(reason) => {
                warn!("Rebuilding index: {}", reason);
                let rows = self.rebuild_locked().await?;
                Ok(StartupOutcome::Rebuilt { reason, rows })
            }
        }
    }

    /// Rebuild from the corpus regardless of what is on disk.
    ///
    /// An existing snapshot keeps serving queries until the new one is
    /// published. Returns the new row count.
    pub async fn rebuild(&self) -> Result<usize> {
        let _writer = self.writer.lock().await;
        info!("Rebuilding index: {}", RebuildReason::Forced);
        self.rebuild_locked().await
    }

    // Caller holds the writer lock.
    async fn rebuild_locked(&self) -> Result<usize> {
        self.handle.set_state(BuilderState::Rebuilding).await;

        match self.build_snapshot().await {
            Ok(snapshot) => {
                let rows = snapshot.len();
                self.handle.publish(snapshot).await;
                info!("Index ready with {} rows", rows);
                Ok(rows)
            }
            Err(e) => {
                let state = self.handle.restore_after_failure().await;
                warn!("Rebuild failed, index remains {}: {}", state, e);
                Err(e)
            }
        }
    }

    async fn build_snapshot(&self) -> Result<IndexSnapshot> {
        info!("Loading corpus from {}", self.corpus.describe());
        let sources = self.corpus.load_corpus().await?;
        if sources.is_empty() {
            warn!("Corpus is empty; building an index with no rows");
        }

        let documents: Vec<Document> = sources.into_iter().map(Document::from).collect();
        let vectors = self.embed_documents(&documents).await?;

        let mut index = VectorIndex::new(self.dimension);
        index.add(&vectors)?;
        let store = DocumentStore::from_documents(documents);

        let paths = self.paths.clone();
        let (index, store) = tokio::task::spawn_blocking(move || -> Result<_> {
            write_aligned_pair(&mut index, &store, &paths)?;
            Ok((index, store))
        })
        .await??;
        info!(
            "Persisted {} rows to {} and {}",
            index.len(),
            self.paths.index_path.display(),
            self.paths.store_path.display()
        );

        IndexSnapshot::new(index, store)
    }

    // One vector per document, every one checked against the index dimension
    // before anything is added.
    async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(documents.len());

        for (batch_no, batch) in documents.chunks(self.batch_size).enumerate() {
            let offset = batch_no * self.batch_size;
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let result = self.provider.embed_texts(&texts).await?;

            if result.embeddings.len() != texts.len() {
                return Err(RetrieverError::EmbeddingCountMismatch {
                    expected: texts.len(),
                    actual: result.embeddings.len(),
                });
            }
            for (i, vector) in result.embeddings.iter().enumerate() {
                if vector.len() != self.dimension {
                    return Err(RetrieverError::EmbeddingDimensionMismatch {
                        document: offset + i,
                        expected: self.dimension,
                        actual: vector.len(),
                    });
                }
            }

            vectors.extend(result.embeddings);
            debug!("Embedded {}/{} documents", vectors.len(), documents.len());
        }

        if !documents.is_empty() {
            info!(
                "Embedded {} documents with {}",
                documents.len(),
                self.provider.provider_name()
            );
        }
        Ok(vectors)
    }
}
