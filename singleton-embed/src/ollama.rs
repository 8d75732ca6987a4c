//! Embedding provider backed by a local Ollama server

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::EmbeddingProvider;
use async_trait::async_trait;
use half::f16;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Calls `POST /api/embeddings` on an Ollama server.
///
/// Every request is bounded by the configured request timeout, and the
/// liveness probe (`GET /api/tags`) by the shorter probe timeout.
#[derive(Debug, Clone)]
pub struct OllamaEmbedProvider {
    client: reqwest::Client,
    config: EmbedConfig,
}

impl OllamaEmbedProvider {
    pub fn new(config: EmbedConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(EmbedError::embedding_gen)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Returns true when the server answers the probe with a success status.
    pub async fn probe(&self) -> bool {
        match self
            .client
            .get(self.config.url("api/tags"))
            .timeout(self.config.probe_timeout())
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama probe at {} failed: {}", self.config.endpoint, e);
                false
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.config.url("api/embeddings"))
            .json(&request)
            .send()
            .await
            .map_err(|source| EmbedError::Unreachable {
                endpoint: self.config.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(EmbedError::embedding_gen)?;
        if parsed.embedding.len() != self.config.dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: self.config.dimension,
                actual: parsed.embedding.len(),
            });
        }

        Ok(parsed.embedding.into_iter().map(f16::from_f32).collect())
    }

    fn embedding_dimension(&self) -> usize {
        self.config.dimension
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        self.probe().await
    }
}
