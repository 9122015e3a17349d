//! Ordered document store persisted as a JSON sidecar.
//!
//! Insertion order is row order: document `i` is described by row `i` of the
//! vector index it was built with. The store is built wholesale and never
//! mutated afterwards.

use super::{Fingerprint, fingerprint, stage_file};
use crate::error::{Result, RetrieverError};
use quarry_ingest::SourceDocument;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Metadata key attached to documents returned from a query.
pub const SIMILARITY_SCORE_KEY: &str = "similarity_score";

/// A stored unit of text plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "text")]
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(Value::as_str)
    }

    /// Squared L2 distance recorded on query results.
    pub fn similarity_score(&self) -> Option<f64> {
        self.metadata.get(SIMILARITY_SCORE_KEY).and_then(Value::as_f64)
    }

    /// Copy of this document with `similarity_score` set.
    pub fn with_similarity_score(&self, distance: f32) -> Self {
        let mut copy = self.clone();
        copy.metadata.insert(
            SIMILARITY_SCORE_KEY.to_string(),
            Value::from(f64::from(distance)),
        );
        copy
    }
}

impl From<SourceDocument> for Document {
    fn from(doc: SourceDocument) -> Self {
        Self {
            content: doc.text,
            metadata: doc.metadata,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Document at `row`, or [`RetrieverError::OutOfRange`].
    pub fn get(&self, row: usize) -> Result<&Document> {
        self.documents.get(row).ok_or(RetrieverError::OutOfRange {
            index: row,
            len: self.documents.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    /// Serialised sidecar contents, destined for `path`.
    pub(crate) fn to_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.documents).map_err(|e| RetrieverError::PersistenceWrite {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Write the store on its own and return its fingerprint.
    ///
    /// Index builds go through [`super::write_aligned_pair`] instead, which
    /// keeps the index header in step with the sidecar.
    pub fn persist(&self, path: &Path) -> Result<Fingerprint> {
        let bytes = self.to_bytes(path)?;
        stage_file(path, &bytes)?.commit()?;
        Ok(fingerprint(&bytes))
    }

    /// Read a sidecar, returning the store and the fingerprint of the bytes read.
    pub fn load(path: &Path) -> Result<(Self, Fingerprint)> {
        let bytes = std::fs::read(path).map_err(|e| RetrieverError::persistence_read(path, e))?;
        let documents: Vec<Document> =
            serde_json::from_slice(&bytes).map_err(|e| RetrieverError::persistence_read(path, e))?;
        Ok((Self { documents }, fingerprint(&bytes)))
    }
}
