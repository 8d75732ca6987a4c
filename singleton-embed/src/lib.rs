//! # singleton-embed
//!
//! Fixed-dimension text embeddings for the singleton indexer, with a
//! deterministic fallback so that every call produces a vector.
//!
//! ## Providers
//!
//! - [`OllamaEmbedProvider`]: calls a local Ollama server (`/api/embeddings`).
//!   Requests carry a timeout and may fail.
//! - [`HashEmbedProvider`]: derives a pseudo-embedding from a stable hash of
//!   the text. Same text, same vector. It never fails.
//! - [`ResilientEmbedder`]: tries the real backend and falls back to hashes
//!   on any failure. This is what the indexer holds.
//!
//! ## Quick Start
//!
//! ```no_run
//! use singleton_embed::{EmbedConfig, ResilientEmbedder};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let embedder = ResilientEmbedder::connect(&EmbedConfig::default()).await?;
//! let vector = embedder.embed("fn main() {}").await;
//! assert_eq!(vector.len(), embedder.dimension());
//! # Ok(())
//! # }
//! ```
//!
//! All vectors are stored as `half::f16` to halve their footprint on disk.

pub mod config;
pub mod error;
pub mod ollama;
pub mod provider;
pub mod resilient;

pub use config::{DEFAULT_DIMENSION, EmbedBackend, EmbedConfig, EmbedConfigBuilder};
pub use error::{EmbedError, Result};
pub use ollama::OllamaEmbedProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, HashEmbedProvider};
pub use resilient::ResilientEmbedder;

pub use half::f16;
