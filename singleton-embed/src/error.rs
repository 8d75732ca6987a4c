//! Error types for the embedding system

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Backend failures (`Unreachable`, `Http`, `DimensionMismatch`) are expected
/// at runtime and are absorbed by [`ResilientEmbedder`](crate::ResilientEmbedder),
/// which falls back to the deterministic hash provider. The remaining variants
/// describe configuration or local failures.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The backend could not be reached or timed out
    #[error("Embedding backend unreachable at {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status
    #[error("Embedding backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The backend produced a vector of the wrong length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Error when the configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Wrap any error raised while producing or decoding an embedding.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EmbeddingGeneration {
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error came from the remote backend rather than local setup.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. }
                | Self::Http { .. }
                | Self::DimensionMismatch { .. }
                | Self::EmbeddingGeneration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EmbedError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 768, got 384"
        );
        assert!(err.is_backend_failure());

        let err = EmbedError::invalid_config("dimension must be positive");
        assert!(err.to_string().contains("dimension must be positive"));
        assert!(!err.is_backend_failure());
    }
}
