//! Embedding provider trait and the deterministic hash provider

use crate::error::Result;
use async_trait::async_trait;
use fnv::FnvHasher;
use half::f16;
use std::hash::Hasher;

/// Vectors for a batch of texts, in input order.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// One vector per input text
    pub embeddings: Vec<Vec<f16>>,
    /// Length of every vector, 0 for an empty batch
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Wraps a batch, taking the dimension from its first vector.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Turns text into fixed-length f16 vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds one text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>>;

    /// Embeds texts one at a time; backends with a batch endpoint override this.
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_text(text).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    /// Length of every vector this provider returns.
    fn embedding_dimension(&self) -> usize;

    /// Short name used in logs and stats.
    fn provider_name(&self) -> &str;

    /// Liveness check. Local providers are always available.
    async fn is_available(&self) -> bool {
        true
    }
}

/// Pseudo-embeddings derived from a stable hash of the text.
///
/// Component `i` is `sin(seed + 0.1 * i) * 0.1`, where `seed` is the low 32 bits
/// of the text's FNV-1a hash. Identical text always yields an identical vector,
/// so similarity lookups stay meaningful for exact repeats even without a model.
#[derive(Debug, Clone)]
pub struct HashEmbedProvider {
    dimension: usize,
}

impl HashEmbedProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Synchronous form of [`EmbeddingProvider::embed_text`]; it cannot fail.
    pub fn embed_sync(&self, text: &str) -> Vec<f16> {
        let seed = text_seed(text);
        (0..self.dimension)
            .map(|i| f16::from_f64((seed + i as f64 * 0.1).sin() * 0.1))
            .collect()
    }
}

fn text_seed(text: &str) -> f64 {
    let mut hasher = FnvHasher::default();
    hasher.write(text.as_bytes());
    f64::from(hasher.finish() as u32)
}

#[async_trait]
impl EmbeddingProvider for HashEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        Ok(self.embed_sync(text))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hash"
    }
}
