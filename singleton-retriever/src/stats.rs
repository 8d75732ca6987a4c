//! Index statistics over both stores

use crate::storage::{MetadataSummary, Stores};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    Running,
    Stopped,
}

impl StoreState {
    fn from_available(available: bool) -> Self {
        if available { Self::Running } else { Self::Stopped }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// Snapshot of what is indexed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_files: usize,
    pub total_chunks: usize,
    /// Vectors in the vector store; may trail chunks
    pub total_vectors: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub database_size_bytes: Option<u64>,
    pub indexed_types: Vec<String>,
    pub metadata_store: StoreState,
    pub vector_store: StoreState,
    pub healthy: bool,
}

impl StoreStats {
    /// Gather statistics. Store errors are logged and show up as zeros.
    pub async fn collect(stores: &Stores) -> Self {
        let summary = match stores.metadata.summary().await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Failed to summarize metadata store: {:#}", e);
                MetadataSummary::default()
            }
        };
        let total_vectors = match stores.vectors.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to count vectors: {:#}", e);
                0
            }
        };

        Self {
            total_files: summary.total_files,
            total_chunks: summary.total_chunks,
            total_vectors,
            last_updated: summary.last_updated,
            database_size_bytes: summary.database_size_bytes,
            indexed_types: summary.indexed_types,
            metadata_store: StoreState::from_available(stores.metadata.is_available()),
            vector_store: StoreState::from_available(stores.vectors.is_available()),
            healthy: stores.metadata.health_check().await,
        }
    }

    pub fn render(&self) -> String {
        let last_updated = self
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let size = self
            .database_size_bytes
            .map(format_size)
            .unwrap_or_else(|| "unknown".to_string());
        let types = if self.indexed_types.is_empty() {
            "none".to_string()
        } else {
            self.indexed_types.join(", ")
        };

        format!(
            "📊 Index statistics\n\n\
             Files: {}\nChunks: {}\nVectors: {}\nLast updated: {}\nDatabase size: {}\n\
             File types: {}\n\nMetadata store: {}\nVector store: {}\nHealth: {}",
            self.total_files,
            self.total_chunks,
            self.total_vectors,
            last_updated,
            size,
            types,
            self.metadata_store.label(),
            self.vector_store.label(),
            if self.healthy { "ok" } else { "degraded" },
        )
    }
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
