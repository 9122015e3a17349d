//! File-based configuration.
//!
//! ```toml
//! [index]
//! index_path = "index/docs.index"
//! # store_path defaults to the index path with a `.store.json` extension
//!
//! [retrieval]
//! top_k = 4
//! distance_threshold = 15.0
//!
//! [corpus]
//! source_path = "data"
//! chunk_size = 500      # omit to index whole files
//! chunk_overlap = 50
//!
//! [embedding]
//! model_name = "all-MiniLM-L6-v2"
//! ```
//!
//! Every key is optional. The embedding dimension is not configurable; it is
//! whatever the embedding provider produces.

use crate::error::{Result, RetrieverError};
use crate::retrieval::retrieval_service::RetrievalConfig;
use crate::storage::IndexPaths;
use quarry_embed::EmbedConfig;
use quarry_ingest::ChunkingOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Looked up in the working directory when no config file is given.
pub const DEFAULT_CONFIG_FILE: &str = "quarry.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub corpus: CorpusConfig,
    pub embedding: EmbedConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub index_path: PathBuf,
    pub store_path: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("index/docs.index"),
            store_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub source_path: PathBuf,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("data"),
            chunk_size: None,
            chunk_overlap: ChunkingOptions::default().chunk_overlap,
        }
    }
}

impl CorpusConfig {
    /// Chunking settings, or `None` to index one document per file.
    pub fn chunking(&self) -> Option<ChunkingOptions> {
        self.chunk_size.map(|chunk_size| ChunkingOptions {
            chunk_size,
            chunk_overlap: self.chunk_overlap,
        })
    }
}

impl QuarryConfig {
    /// Parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RetrieverError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&text)
            .map_err(|e| RetrieverError::config(format!("{}: {e}", path.display())))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, else [`DEFAULT_CONFIG_FILE`] if it exists, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| RetrieverError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;

        if let Some(chunk_size) = self.corpus.chunk_size {
            if chunk_size == 0 {
                return Err(RetrieverError::config("corpus.chunk_size must be at least 1"));
            }
            if self.corpus.chunk_overlap >= chunk_size {
                return Err(RetrieverError::config(format!(
                    "corpus.chunk_overlap ({}) must be smaller than corpus.chunk_size ({})",
                    self.corpus.chunk_overlap, chunk_size
                )));
            }
        }

        self.embedding.validate()?;
        Ok(())
    }

    pub fn index_paths(&self) -> IndexPaths {
        match &self.index.store_path {
            Some(store_path) => IndexPaths::new(&self.index.index_path, store_path),
            None => IndexPaths::from_index_path(&self.index.index_path),
        }
    }
}
