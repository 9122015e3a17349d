//! Persistent storage for the retriever: the vector index and its aligned
//! document store.
//!
//! The two halves live in separate files but are only ever written together,
//! through [`write_aligned_pair`]. Row `i` of the index belongs to document
//! `i` of the store.
//!
//! ## On-disk layout
//!
//! ```text
//! index/docs.index        binary vector index (see vector_index)
//! index/docs.store.json   [{ "text": ..., "metadata": {...} }, ...]
//! ```
//!
//! ## Write protocol
//!
//! Both files are staged as temporary files next to their destination and
//! fsynced before either is renamed into place. The sidecar is renamed first,
//! the index second. The index header records the blake3 fingerprint of the
//! sidecar bytes, so a crash between the renames leaves a pair whose
//! fingerprints disagree, which the loader treats as stale.

use crate::error::{Result, RetrieverError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub mod document_store;
pub mod vector_index;

pub use document_store::{Document, DocumentStore};
pub use vector_index::{SearchHit, VectorIndex};

/// Blake3 digest of a persisted sidecar (32 bytes).
pub type Fingerprint = [u8; 32];

/// Fingerprint of raw sidecar bytes.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    *blake3::hash(bytes).as_bytes()
}

/// Locations of a persisted index and its sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub index_path: PathBuf,
    pub store_path: PathBuf,
}

impl IndexPaths {
    pub fn new(index_path: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            store_path: store_path.into(),
        }
    }

    /// Derive the sidecar path from the index path: `docs.index` becomes
    /// `docs.store.json` in the same directory.
    pub fn from_index_path(index_path: impl Into<PathBuf>) -> Self {
        let index_path = index_path.into();
        let store_path = index_path.with_extension("store.json");
        Self {
            index_path,
            store_path,
        }
    }

    /// True when both files exist.
    pub fn exist(&self) -> bool {
        self.index_path.is_file() && self.store_path.is_file()
    }
}

/// A fully written, fsynced temporary file waiting to be renamed over its target.
pub(crate) struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    pub(crate) fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| RetrieverError::PersistenceWrite {
                path: target.clone(),
                source: e.error,
            })?;
        debug!("Committed {}", target.display());
        Ok(())
    }
}

/// Write `bytes` to a temporary file in `target`'s directory and fsync it.
pub(crate) fn stage_file(target: &Path, bytes: &[u8]) -> Result<StagedFile> {
    let write_err = |source| RetrieverError::PersistenceWrite {
        path: target.to_path_buf(),
        source,
    };

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(bytes).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;

    Ok(StagedFile {
        temp,
        target: target.to_path_buf(),
    })
}

/// Persist an index and its store as an aligned pair.
///
/// The index is stamped with the sidecar fingerprint and the current time
/// before it is written. Nothing is renamed into place unless both files were
/// staged successfully. Returns the sidecar fingerprint.
pub fn write_aligned_pair(
    index: &mut VectorIndex,
    store: &DocumentStore,
    paths: &IndexPaths,
) -> Result<Fingerprint> {
    if index.len() != store.len() {
        return Err(RetrieverError::Misaligned {
            index_rows: index.len(),
            store_len: store.len(),
        });
    }

    let store_bytes = store.to_bytes(&paths.store_path)?;
    let store_fp = fingerprint(&store_bytes);
    index.set_store_fingerprint(store_fp);
    index.set_built_at(chrono::Utc::now().timestamp());

    let staged_store = stage_file(&paths.store_path, &store_bytes)?;
    let staged_index = stage_file(&paths.index_path, &index.to_bytes())?;

    staged_store.commit()?;
    staged_index.commit()?;

    debug!(
        "Persisted {} rows to {} (store fingerprint {})",
        index.len(),
        paths.index_path.display(),
        hex::encode(&store_fp[..8])
    );
    Ok(store_fp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_ingest::SourceDocument;
    use tempfile::tempdir;

    #[test]
    fn test_store_path_is_derived_from_index_path() {
        let paths = IndexPaths::from_index_path("index/docs.index");
        assert_eq!(paths.store_path, PathBuf::from("index/docs.store.json"));

        let bare = IndexPaths::from_index_path("vectors");
        assert_eq!(bare.store_path, PathBuf::from("vectors.store.json"));
    }

    #[test]
    fn test_write_aligned_pair_links_index_to_store() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::from_index_path(dir.path().join("index").join("docs.index"));

        let store = DocumentStore::from_documents(vec![
            SourceDocument::new("alpha", "a.txt", "txt").into(),
            SourceDocument::new("beta", "b.txt", "txt").into(),
        ]);
        let mut index = VectorIndex::new(2);
        index.add(&[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();

        let fp = write_aligned_pair(&mut index, &store, &paths).unwrap();
        assert!(paths.exist());

        let loaded_index = VectorIndex::load(&paths.index_path).unwrap();
        let (loaded_store, loaded_fp) = DocumentStore::load(&paths.store_path).unwrap();
        assert_eq!(loaded_index.store_fingerprint(), Some(fp));
        assert_eq!(loaded_fp, fp);
        assert_eq!(loaded_store, store);
        assert!(loaded_index.built_at().is_some());
    }

    #[test]
    fn test_write_aligned_pair_refuses_misaligned_input() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::from_index_path(dir.path().join("docs.index"));

        let store = DocumentStore::from_documents(vec![
            SourceDocument::new("only one", "a.txt", "txt").into(),
        ]);
        let mut index = VectorIndex::new(1);
        index.add(&[vec![0.0], vec![1.0]]).unwrap();

        assert!(matches!(
            write_aligned_pair(&mut index, &store, &paths),
            Err(RetrieverError::Misaligned {
                index_rows: 2,
                store_len: 1
            })
        ));
        assert!(!paths.index_path.exists());
        assert!(!paths.store_path.exists());
    }

    #[test]
    fn test_staged_file_is_invisible_until_commit() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.bin");

        let staged = stage_file(&target, b"payload").unwrap();
        assert!(!target.exists());
        staged.commit().unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
    }
}
