//! Shared, swappable index state.
//!
//! An [`IndexHandle`] is the single authority on whether queries may be served.
//! It holds the builder's [`BuilderState`] and, once a build or load has
//! finished, an immutable [`IndexSnapshot`]. Readers clone the snapshot `Arc`
//! and query it without holding the lock; the builder publishes a new snapshot
//! by swapping the pointer, so a reader sees either the previous complete index
//! or the next one, never a half-built one.

use crate::error::{Result, RetrieverError};
use crate::storage::{DocumentStore, VectorIndex};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lifecycle of the index builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderState {
    Unloaded,
    Loading,
    Rebuilding,
    Ready,
}

impl fmt::Display for BuilderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuilderState::Unloaded => "unloaded",
            BuilderState::Loading => "loading",
            BuilderState::Rebuilding => "rebuilding",
            BuilderState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// An aligned vector index and document store.
#[derive(Debug)]
pub struct IndexSnapshot {
    index: VectorIndex,
    store: DocumentStore,
}

impl IndexSnapshot {
    /// Pair an index with its store, refusing pairs whose lengths differ.
    pub fn new(index: VectorIndex, store: DocumentStore) -> Result<Self> {
        check_alignment(&index, &store)?;
        Ok(Self { index, store })
    }

    #[cfg(test)]
    pub(crate) fn unchecked(index: VectorIndex, store: DocumentStore) -> Self {
        Self { index, store }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}

/// Fails with [`RetrieverError::Misaligned`] unless row counts match.
pub fn check_alignment(index: &VectorIndex, store: &DocumentStore) -> Result<()> {
    if index.len() != store.len() {
        return Err(RetrieverError::Misaligned {
            index_rows: index.len(),
            store_len: store.len(),
        });
    }
    Ok(())
}

#[derive(Debug)]
struct HandleState {
    state: BuilderState,
    snapshot: Option<Arc<IndexSnapshot>>,
}

/// Cloneable handle to the current index state.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    inner: Arc<RwLock<HandleState>>,
}

impl Default for IndexHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HandleState {
                state: BuilderState::Unloaded,
                snapshot: None,
            })),
        }
    }

    pub async fn state(&self) -> BuilderState {
        self.inner.read().await.state
    }

    /// The last published snapshot, if any.
    pub async fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.inner.read().await.snapshot.clone()
    }

    /// The snapshot queries should run against.
    ///
    /// A snapshot stays servable while a forced rebuild is running; before the
    /// first one is published this fails with [`RetrieverError::NotReady`].
    pub async fn ready_snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        let guard = self.inner.read().await;
        guard
            .snapshot
            .clone()
            .ok_or(RetrieverError::NotReady { state: guard.state })
    }

    pub(crate) async fn set_state(&self, state: BuilderState) {
        self.inner.write().await.state = state;
    }

    /// Drop back to `Ready` if a snapshot is being served, `Unloaded` otherwise.
    pub(crate) async fn restore_after_failure(&self) -> BuilderState {
        let mut guard = self.inner.write().await;
        guard.state = if guard.snapshot.is_some() {
            BuilderState::Ready
        } else {
            BuilderState::Unloaded
        };
        guard.state
    }

    /// Swap in `snapshot` and mark the handle ready.
    pub(crate) async fn publish(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.inner.write().await;
        guard.snapshot = Some(Arc::clone(&snapshot));
        guard.state = BuilderState::Ready;
        snapshot
    }
}
