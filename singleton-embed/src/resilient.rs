//! An embedder that always returns a vector

use crate::config::{EmbedBackend, EmbedConfig};
use crate::error::Result;
use crate::ollama::OllamaEmbedProvider;
use crate::provider::{EmbeddingProvider, HashEmbedProvider};
use async_trait::async_trait;
use half::f16;
use std::sync::Arc;
use tracing::{info, warn};

/// Wraps an optional real backend with the deterministic hash provider.
///
/// [`embed`](Self::embed) never fails. A backend error, timeout or wrong-length
/// vector is logged and the hash vector is returned instead, so callers always
/// get exactly [`dimension`](Self::dimension) components.
#[derive(Clone)]
pub struct ResilientEmbedder {
    primary: Option<Arc<dyn EmbeddingProvider>>,
    fallback: HashEmbedProvider,
    dimension: usize,
}

impl std::fmt::Debug for ResilientEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientEmbedder")
            .field(
                "primary",
                &self.primary.as_ref().map(|p| p.provider_name().to_string()),
            )
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl ResilientEmbedder {
    /// Only the hash provider.
    pub fn hash_only(dimension: usize) -> Self {
        Self {
            primary: None,
            fallback: HashEmbedProvider::new(dimension),
            dimension,
        }
    }

    /// Use `primary` first, falling back per call.
    pub fn with_primary(primary: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self {
            primary: Some(primary),
            fallback: HashEmbedProvider::new(dimension),
            dimension,
        }
    }

    /// Pick the backend described by `config`.
    ///
    /// With [`EmbedBackend::Auto`] the server is probed once; when it does not
    /// answer the embedder runs on hashes alone for its whole lifetime.
    pub async fn connect(config: &EmbedConfig) -> Result<Self> {
        config.validate()?;
        match config.backend {
            EmbedBackend::Hash => {
                info!("Embedding with hash provider ({} dimensions)", config.dimension);
                Ok(Self::hash_only(config.dimension))
            }
            EmbedBackend::Ollama => {
                let provider = OllamaEmbedProvider::new(config.clone())?;
                info!("Embedding with Ollama model {} at {}", config.model, config.endpoint);
                Ok(Self::with_primary(Arc::new(provider), config.dimension))
            }
            EmbedBackend::Auto => {
                let provider = OllamaEmbedProvider::new(config.clone())?;
                if provider.probe().await {
                    info!("Ollama reachable at {}, embedding with {}", config.endpoint, config.model);
                    Ok(Self::with_primary(Arc::new(provider), config.dimension))
                } else {
                    info!(
                        "Ollama not reachable at {}, embedding with hash provider",
                        config.endpoint
                    );
                    Ok(Self::hash_only(config.dimension))
                }
            }
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Name of the provider tried first.
    pub fn backend_name(&self) -> &str {
        self.primary
            .as_ref()
            .map(|p| p.provider_name())
            .unwrap_or_else(|| self.fallback.provider_name())
    }

    pub async fn embed(&self, text: &str) -> Vec<f16> {
        if let Some(primary) = &self.primary {
            match primary.embed_text(text).await {
                Ok(vector) if vector.len() == self.dimension => return vector,
                Ok(vector) => warn!(
                    "{} returned {} dimensions instead of {}, using hash embedding",
                    primary.provider_name(),
                    vector.len(),
                    self.dimension
                ),
                Err(e) => warn!(
                    "{} embedding failed, using hash embedding: {}",
                    primary.provider_name(),
                    e
                ),
            }
        }
        self.fallback.embed_sync(text)
    }
}

#[async_trait]
impl EmbeddingProvider for ResilientEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        Ok(self.embed(text).await)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "resilient"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbedError;
    use crate::ollama::tests::{dead_endpoint, serve};
    use tracing_test::traced_test;

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f16>> {
            Err(EmbedError::invalid_config("always fails"))
        }

        fn embedding_dimension(&self) -> usize {
            8
        }

        fn provider_name(&self) -> &str {
            "failing"
        }
    }

    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f16>> {
            Ok(vec![f16::ONE; 3])
        }

        fn embedding_dimension(&self) -> usize {
            3
        }

        fn provider_name(&self) -> &str {
            "short"
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn test_failing_primary_falls_back_to_hash() {
        let embedder = ResilientEmbedder::with_primary(Arc::new(FailingProvider), 8);
        let expected = HashEmbedProvider::new(8).embed_sync("some text");

        assert_eq!(embedder.backend_name(), "failing");
        assert_eq!(embedder.embed("some text").await, expected);
        assert!(logs_contain("using hash embedding"));
    }

    #[tokio::test]
    async fn test_wrong_length_primary_falls_back_to_hash() {
        let embedder = ResilientEmbedder::with_primary(Arc::new(ShortProvider), 8);
        let vector = embedder.embed("x").await;
        assert_eq!(vector.len(), 8);
        assert_eq!(vector, HashEmbedProvider::new(8).embed_sync("x"));
    }

    #[tokio::test]
    async fn test_auto_without_server_uses_hash() -> Result<()> {
        let config = EmbedConfig::builder()
            .endpoint(dead_endpoint().await)
            .probe_timeout_ms(300u64)
            .build()
            .unwrap();
        let embedder = ResilientEmbedder::connect(&config).await?;

        assert_eq!(embedder.backend_name(), "hash");
        assert_eq!(embedder.embed("anything").await.len(), 768);
        Ok(())
    }

    #[tokio::test]
    async fn test_auto_with_server_uses_ollama() -> Result<()> {
        let endpoint = serve(vec![
            ("/api/tags", 200, r#"{"models":[]}"#.to_string()),
            ("/api/embeddings", 200, r#"{"embedding":[0.5,0.5,0.5,0.5]}"#.to_string()),
        ])
        .await;
        let config = EmbedConfig::builder()
            .endpoint(endpoint)
            .dimension(4usize)
            .build()
            .unwrap();
        let embedder = ResilientEmbedder::connect(&config).await?;

        assert_eq!(embedder.backend_name(), "ollama");
        assert_eq!(embedder.embed("anything").await, vec![f16::from_f32(0.5); 4]);
        Ok(())
    }

    #[tokio::test]
    async fn test_forced_ollama_backend_still_total() -> Result<()> {
        let config = EmbedConfig::builder()
            .backend(EmbedBackend::Ollama)
            .endpoint(dead_endpoint().await)
            .request_timeout_ms(500u64)
            .build()
            .unwrap();
        let embedder = ResilientEmbedder::connect(&config).await?;

        assert_eq!(embedder.backend_name(), "ollama");
        let texts = vec!["a".to_string(), "b".to_string()];
        let result = embedder.embed_texts(&texts).await?;
        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 768);
        Ok(())
    }
}
