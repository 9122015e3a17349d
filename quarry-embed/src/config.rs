//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Models that ship with fastembed and can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedModel {
    AllMiniLmL6V2,
    AllMiniLmL12V2,
    BgeSmallEnV15,
    BgeBaseEnV15,
    SnowflakeArcticEmbedXs,
}

impl SupportedModel {
    /// All selectable models, in the order they are listed to users.
    pub const ALL: &'static [SupportedModel] = &[
        SupportedModel::AllMiniLmL6V2,
        SupportedModel::AllMiniLmL12V2,
        SupportedModel::BgeSmallEnV15,
        SupportedModel::BgeBaseEnV15,
        SupportedModel::SnowflakeArcticEmbedXs,
    ];

    /// Canonical name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            SupportedModel::AllMiniLmL6V2 => "all-MiniLM-L6-v2",
            SupportedModel::AllMiniLmL12V2 => "all-MiniLM-L12-v2",
            SupportedModel::BgeSmallEnV15 => "bge-small-en-v1.5",
            SupportedModel::BgeBaseEnV15 => "bge-base-en-v1.5",
            SupportedModel::SnowflakeArcticEmbedXs => "snowflake-arctic-embed-xs",
        }
    }

    /// Dimension the model is documented to produce. The provider still
    /// probes the loaded model and trusts the probe over this value.
    pub fn expected_dimension(&self) -> usize {
        match self {
            SupportedModel::BgeBaseEnV15 => 768,
            _ => 384,
        }
    }

    pub(crate) fn fastembed_model(&self) -> fastembed::EmbeddingModel {
        use fastembed::EmbeddingModel;
        match self {
            SupportedModel::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            SupportedModel::AllMiniLmL12V2 => EmbeddingModel::AllMiniLML12V2,
            SupportedModel::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            SupportedModel::BgeBaseEnV15 => EmbeddingModel::BGEBaseENV15,
            SupportedModel::SnowflakeArcticEmbedXs => EmbeddingModel::SnowflakeArcticEmbedXS,
        }
    }
}

impl std::fmt::Display for SupportedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SupportedModel {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self> {
        // HuggingFace style names ("sentence-transformers/all-MiniLM-L6-v2") are accepted too
        let short = s.rsplit('/').next().unwrap_or(s);
        SupportedModel::ALL
            .iter()
            .copied()
            .find(|model| model.name().eq_ignore_ascii_case(short))
            .ok_or_else(|| EmbedError::UnknownModel {
                name: s.to_string(),
            })
    }
}

/// Configuration for embedding models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    pub model_name: String,
    /// Directory where fastembed caches downloaded model files
    pub cache_dir: PathBuf,
    /// Maximum batch size for embedding generation
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    pub normalize: bool,
    /// Show a progress bar while the model downloads
    pub show_download_progress: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: SupportedModel::AllMiniLmL6V2.name().to_string(),
            cache_dir: PathBuf::from("models"),
            batch_size: 16,
            normalize: true,
            show_download_progress: true,
        }
    }
}

impl EmbedConfig {
    /// Create a configuration for the named model with default settings.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..self
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Resolve the configured name to a supported model.
    pub fn model(&self) -> Result<SupportedModel> {
        self.model_name.parse()
    }

    /// Validate settings that would otherwise fail late, during inference.
    pub fn validate(&self) -> Result<()> {
        self.model()?;
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        tracing::debug!("Embedding configuration valid for: {}", self.model_name);
        Ok(())
    }
}
