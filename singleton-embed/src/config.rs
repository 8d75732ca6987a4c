//! Configuration for embedding backends

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vector length shared by every provider unless configured otherwise.
pub const DEFAULT_DIMENSION: usize = 768;

/// Default Ollama endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default Ollama embedding model. It produces 768-dimensional vectors.
pub const DEFAULT_MODEL: &str = "nomic-embed-text";

/// Which backend [`ResilientEmbedder`](crate::ResilientEmbedder) should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedBackend {
    /// Probe the remote backend once at startup and use it if it answers.
    #[default]
    Auto,
    /// Always try the remote backend, falling back per call.
    Ollama,
    /// Never contact a backend.
    Hash,
}

/// Configuration for embedding generation
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct EmbedConfig {
    #[builder(default)]
    pub backend: EmbedBackend,
    /// Base URL of the Ollama server
    #[builder(default = "DEFAULT_ENDPOINT.to_string()")]
    pub endpoint: String,
    /// Name of the embedding model to request
    #[builder(default = "DEFAULT_MODEL.to_string()")]
    pub model: String,
    /// Length of every produced vector
    #[builder(default = "DEFAULT_DIMENSION")]
    pub dimension: usize,
    /// Timeout for the liveness probe
    #[builder(default = "2000")]
    pub probe_timeout_ms: u64,
    /// Timeout for a single embedding request
    #[builder(default = "30000")]
    pub request_timeout_ms: u64,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            backend: EmbedBackend::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            probe_timeout_ms: 2000,
            request_timeout_ms: 30000,
        }
    }
}

impl EmbedConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.dimension == Some(0) {
            return Err("dimension must be positive".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("endpoint must be an http(s) URL: {endpoint}"));
            }
        }
        Ok(())
    }
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// A configuration that never contacts a backend.
    pub fn hash_only(dimension: usize) -> Self {
        Self {
            backend: EmbedBackend::Hash,
            dimension,
            ..Self::default()
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Endpoint URL for `path`, tolerating a trailing slash on the base.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    /// Validate a configuration that was deserialized rather than built.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(EmbedError::invalid_config("dimension must be positive"));
        }
        if self.backend != EmbedBackend::Hash
            && !self.endpoint.starts_with("http://")
            && !self.endpoint.starts_with("https://")
        {
            return Err(EmbedError::invalid_config(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EmbedConfig::builder().build().unwrap();

        assert_eq!(config.backend, EmbedBackend::Auto);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.dimension, 768);
        assert_eq!(config.probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_derive_builder_pattern() {
        let config = EmbedConfig::builder()
            .backend(EmbedBackend::Ollama)
            .endpoint("http://127.0.0.1:9999/")
            .dimension(384usize)
            .build()
            .unwrap();

        assert_eq!(config.backend, EmbedBackend::Ollama);
        assert_eq!(config.dimension, 384);
        assert_eq!(config.url("api/tags"), "http://127.0.0.1:9999/api/tags");
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        assert!(EmbedConfig::builder().dimension(0usize).build().is_err());
        assert!(EmbedConfig::builder().endpoint("localhost:11434").build().is_err());
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: EmbedConfig =
            serde_json::from_str(r#"{"backend": "hash", "dimension": 16}"#).unwrap();
        assert_eq!(config.backend, EmbedBackend::Hash);
        assert_eq!(config.dimension, 16);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(config.validate().is_ok());

        let broken = EmbedConfig {
            dimension: 0,
            ..EmbedConfig::default()
        };
        assert!(broken.validate().is_err());
    }
}
