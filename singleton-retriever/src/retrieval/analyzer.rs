use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// What the watcher drives for every filesystem change.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// A file was created or modified.
    async fn analyze(&self, absolute_path: &Path) -> Result<()>;

    /// A file or directory disappeared.
    async fn forget(&self, absolute_path: &Path) -> Result<()>;
}

#[cfg(test)]
pub(crate) use mock::MockAnalyzer;
