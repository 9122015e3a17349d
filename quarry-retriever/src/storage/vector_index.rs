//! Flat vector index with exact squared-L2 search.
//!
//! Rows are stored contiguously in one `Vec<f32>` (row-major). Search is a
//! linear scan over every row, so results are exact; this is meant for corpora
//! small enough that a scan per query is cheap.
//!
//! ## File format
//!
//! ```text
//! magic     b"QVIX"          4 bytes
//! version   u32 LE           currently 1
//! dimension u32 LE
//! rows      u64 LE
//! built_at  i64 LE           unix seconds, 0 when unknown
//! store_fp  [u8; 32]         blake3 of the aligned sidecar, zero when unset
//! payload   rows*dim f32 LE  row-major
//! ```
//!
//! The payload is written and read with `bytemuck` in native byte order, so
//! the crate refuses to build for big-endian targets.

use super::{Fingerprint, stage_file};
use crate::error::{Result, RetrieverError};
use std::cmp::Ordering;
use std::path::Path;

const _: () = assert!(
    cfg!(target_endian = "little"),
    "the vector index file format assumes a little-endian target"
);

const MAGIC: &[u8; 4] = b"QVIX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8 + 32;

/// One search candidate: a row number and its squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub row: usize,
    pub distance: f32,
}

/// Exact nearest-neighbour index over fixed-dimension `f32` vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
    store_fingerprint: Option<Fingerprint>,
    built_at: Option<i64>,
}

impl VectorIndex {
    /// Allocate an empty index for `dimension`-length vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            store_fingerprint: None,
            built_at: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fingerprint of the document store this index was persisted alongside.
    pub fn store_fingerprint(&self) -> Option<Fingerprint> {
        self.store_fingerprint
    }

    pub(crate) fn set_store_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.store_fingerprint = Some(fingerprint);
    }

    /// Unix timestamp recorded when the index was last persisted by a build.
    pub fn built_at(&self) -> Option<i64> {
        self.built_at
    }

    pub(crate) fn set_built_at(&mut self, timestamp: i64) {
        self.built_at = Some(timestamp);
    }

    /// Borrow row `row`, if it exists.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Append `vectors` in order.
    ///
    /// Every vector is checked before anything is appended, so a
    /// [`RetrieverError::DimensionMismatch`] leaves the index unchanged.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Up to `k` nearest rows to `query`, closest first.
    ///
    /// Distances are squared Euclidean. Equal distances are ordered by row
    /// number. An empty index yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| SearchHit {
                row,
                distance: squared_l2(vector, query),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, compare_hits);
            hits.truncate(k);
        }
        hits.sort_unstable_by(compare_hits);
        Ok(hits)
    }

    /// Write the index to `path`, replacing any existing file atomically.
    pub fn persist(&self, path: &Path) -> Result<()> {
        stage_file(path, &self.to_bytes())?.commit()
    }

    /// Read an index written by [`persist`](Self::persist).
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| RetrieverError::persistence_read(path, e))?;
        Self::from_bytes(&bytes).map_err(|reason| RetrieverError::persistence_read(path, reason))
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let payload: &[u8] = bytemuck::cast_slice(&self.data);
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&self.built_at.unwrap_or(0).to_le_bytes());
        bytes.extend_from_slice(&self.store_fingerprint.unwrap_or([0; 32]));
        bytes.extend_from_slice(payload);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < HEADER_LEN {
            return Err(format!("file is {} bytes, shorter than the header", bytes.len()));
        }
        let (header, payload) = bytes.split_at(HEADER_LEN);

        if &header[0..4] != MAGIC {
            return Err("not a vector index file (bad magic)".to_string());
        }
        let version = u32::from_le_bytes(header[4..8].try_into().map_err(|_| "bad header")?);
        if version != FORMAT_VERSION {
            return Err(format!("unsupported format version {version}"));
        }
        let dimension = u32::from_le_bytes(header[8..12].try_into().map_err(|_| "bad header")?) as usize;
        let rows = u64::from_le_bytes(header[12..20].try_into().map_err(|_| "bad header")?) as usize;
        let built_at = i64::from_le_bytes(header[20..28].try_into().map_err(|_| "bad header")?);
        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&header[28..60]);

        let expected_len = rows
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(size_of::<f32>()))
            .ok_or("row count overflows")?;
        if payload.len() != expected_len {
            return Err(format!(
                "payload is {} bytes, expected {} for {} rows of dimension {}",
                payload.len(),
                expected_len,
                rows,
                dimension
            ));
        }
        if dimension == 0 && rows > 0 {
            return Err("rows recorded for a zero-dimension index".to_string());
        }

        Ok(Self {
            dimension,
            data: payload
                .chunks_exact(size_of::<f32>())
                .map(bytemuck::pod_read_unaligned::<f32>)
                .collect(),
            store_fingerprint: (fingerprint != [0; 32]).then_some(fingerprint),
            built_at: (built_at != 0).then_some(built_at),
        })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.row.cmp(&b.row))
}
