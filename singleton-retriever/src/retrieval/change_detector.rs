//! Content fingerprints and the freshness rule
//!
//! A file is fresh when its stored hash equals the current digest *and* it was
//! indexed within the freshness window. Anything else needs indexing.

use crate::storage::MetadataStore;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_FRESHNESS_HOURS: i64 = 24;

/// Hex blake3 digest of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// No record for the path.
    New,
    /// The stored hash differs.
    Modified,
    /// Same hash, but indexed outside the freshness window.
    Stale,
    Fresh,
}

impl ChangeStatus {
    pub fn needs_indexing(self) -> bool {
        self != ChangeStatus::Fresh
    }
}

#[derive(Clone)]
pub struct ChangeDetector {
    metadata: Arc<dyn MetadataStore>,
    freshness: Duration,
}

impl ChangeDetector {
    pub fn new(metadata: Arc<dyn MetadataStore>, freshness_hours: i64) -> Self {
        Self {
            metadata,
            freshness: Duration::hours(freshness_hours),
        }
    }

    /// Compare `content_hash` with the stored record for `path_key`.
    /// A failed lookup counts as [`ChangeStatus::New`].
    pub async fn check(&self, path_key: &str, content_hash: &str) -> ChangeStatus {
        let record = match self.metadata.get_file(path_key).await {
            Ok(Some(record)) => record,
            Ok(None) => return ChangeStatus::New,
            Err(e) => {
                debug!("Lookup of {} failed, treating as new: {:#}", path_key, e);
                return ChangeStatus::New;
            }
        };

        if record.content_hash != content_hash {
            ChangeStatus::Modified
        } else if Utc::now() - record.last_indexed_at > self.freshness {
            ChangeStatus::Stale
        } else {
            ChangeStatus::Fresh
        }
    }

    /// Read `path` and decide whether it must be (re)indexed.
    pub async fn needs_indexing(&self, path: &Path) -> Result<bool> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let key = path.to_string_lossy();
        Ok(self.check(&key, &fingerprint(&bytes)).await.needs_indexing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileRecord, SqliteMetadataStore};

    async fn detector_with(record: Option<FileRecord>) -> Result<ChangeDetector> {
        let store = SqliteMetadataStore::open_memory().await?;
        if let Some(record) = record {
            store.upsert_file(&record).await?;
        }
        Ok(ChangeDetector::new(Arc::new(store), DEFAULT_FRESHNESS_HOURS))
    }

    fn record(hash: &str, age: Duration) -> FileRecord {
        FileRecord {
            path: "/home/me/Code/a.rs".to_string(),
            content_hash: hash.to_string(),
            last_indexed_at: Utc::now() - age,
            size_bytes: 3,
            file_type: "code".to_string(),
            language: "rust".to_string(),
            chunk_count: 1,
        }
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let digest = fingerprint(b"hello");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, fingerprint(b"hello"));
        assert_ne!(digest, fingerprint(b"hello!"));
    }

    #[tokio::test]
    async fn test_status_transitions() -> Result<()> {
        let hash = fingerprint(b"abc");

        let detector = detector_with(None).await?;
        assert_eq!(detector.check("/home/me/Code/a.rs", &hash).await, ChangeStatus::New);

        let detector = detector_with(Some(record(&hash, Duration::minutes(5)))).await?;
        assert_eq!(detector.check("/home/me/Code/a.rs", &hash).await, ChangeStatus::Fresh);
        assert_eq!(
            detector.check("/home/me/Code/a.rs", &fingerprint(b"abd")).await,
            ChangeStatus::Modified
        );

        let detector = detector_with(Some(record(&hash, Duration::hours(25)))).await?;
        let status = detector.check("/home/me/Code/a.rs", &hash).await;
        assert_eq!(status, ChangeStatus::Stale);
        assert!(status.needs_indexing());
        Ok(())
    }

    #[tokio::test]
    async fn test_needs_indexing_reads_file() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("a.txt");
        tokio::fs::write(&path, "some content").await?;

        let store = Arc::new(SqliteMetadataStore::open_memory().await?);
        let detector = ChangeDetector::new(store.clone(), DEFAULT_FRESHNESS_HOURS);
        assert!(detector.needs_indexing(&path).await?);

        store
            .upsert_file(&FileRecord {
                path: path.to_string_lossy().into_owned(),
                content_hash: fingerprint(b"some content"),
                last_indexed_at: Utc::now(),
                size_bytes: 12,
                file_type: "text".to_string(),
                language: "plain".to_string(),
                chunk_count: 1,
            })
            .await?;
        assert!(!detector.needs_indexing(&path).await?);

        assert!(detector.needs_indexing(&temp_dir.path().join("missing.txt")).await.is_err());
        Ok(())
    }
}
