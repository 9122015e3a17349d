//! # quarry-embed
//!
//! Text embedding providers for quarry. The retrieval core only sees the
//! [`EmbeddingProvider`] trait: text goes in, a fixed-dimension `f32` vector
//! comes out. [`FastEmbedProvider`] implements it with local ONNX models via
//! fastembed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use quarry_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: model selection and batching settings
//! - [`provider`]: the provider trait and the fastembed implementation
//! - [`error`]: error types and result handling
//!
//! Providers are plain values. Construct one at startup and share it with an
//! `Arc`; there is no process-wide model registry.

pub mod config;
pub mod error;
pub mod provider;

pub use config::{EmbedConfig, SupportedModel};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider, l2_normalize};
