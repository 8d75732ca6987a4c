//! Storage abstraction layer for singleton-retriever
//!
//! Two independent stores back the index:
//!
//! - **MetadataStore**: file records, chunk text and the search history log.
//!   Every search reads from it.
//! - **VectorStore**: one embedding per chunk for similarity lookup.
//!
//! ## Architecture
//!
//! ```text
//! MetadataStore ── SqliteMetadataStore (singleton.db) | OfflineMetadataStore
//! VectorStore   ── SqliteVectorStore   (vectors.db)   | DisabledVectorStore
//! ```
//!
//! The two are never written in one transaction. A chunk may exist without a
//! vector and that is a normal state. [`Stores::open`] opens each store on
//! its own and substitutes the offline variant for whichever one fails, so the
//! rest of the system keeps working with what survived.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use half::f16;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod offline;
pub mod sqlite_store;
pub mod vector_store;

pub use offline::{DisabledVectorStore, OfflineMetadataStore};
pub use sqlite_store::SqliteMetadataStore;
pub use vector_store::SqliteVectorStore;

/// Metadata database file name inside the data directory.
pub const METADATA_DB: &str = "singleton.db";

/// Vector database file name inside the data directory.
pub const VECTOR_DB: &str = "vectors.db";

/// Directory under the data directory that receives metadata backups.
pub const BACKUP_DIR: &str = "backups";

/// Persisted description of one indexed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    /// Absolute path; the natural key.
    pub path: String,
    /// Hex blake3 digest of the raw bytes.
    pub content_hash: String,
    pub last_indexed_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub file_type: String,
    pub language: String,
    pub chunk_count: usize,
}

/// A bounded slice of a file's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub file_path: String,
    /// Unique within `file_path`.
    pub chunk_id: String,
    pub text_content: String,
    pub file_type: String,
    pub language: String,
}

/// A chunk's embedding, mirrored into the vector store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorEntry {
    #[serde(skip)]
    pub vector: Vec<f16>,
    pub text: String,
    pub path: String,
    pub chunk_id: String,
    pub file_type: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

/// One line of the append-only search audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHistoryEntry {
    pub query: String,
    pub results_count: usize,
    pub search_type: String,
    pub created_at: DateTime<Utc>,
}

impl SearchHistoryEntry {
    pub fn new(query: impl Into<String>, results_count: usize, search_type: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            results_count,
            search_type: search_type.into(),
            created_at: Utc::now(),
        }
    }
}

/// Aggregate figures over the metadata store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataSummary {
    pub total_files: usize,
    pub total_chunks: usize,
    pub last_updated: Option<DateTime<Utc>>,
    /// Distinct `file_type` values, sorted.
    pub indexed_types: Vec<String>,
    pub database_size_bytes: Option<u64>,
}

/// Durable record of indexed files, chunks and searches.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// False for the offline stand-in.
    fn is_available(&self) -> bool;

    /// Cheap round trip to the backing database.
    async fn health_check(&self) -> bool;

    /// Insert or replace the record keyed by `record.path`.
    async fn upsert_file(&self, record: &FileRecord) -> Result<()>;

    async fn get_file(&self, path: &str) -> Result<Option<FileRecord>>;

    /// Replace every chunk of `path` with `chunks` atomically.
    async fn replace_chunks(&self, path: &str, chunks: &[Chunk]) -> Result<()>;

    /// Chunks of `path` in insertion order.
    async fn get_chunks(&self, path: &str) -> Result<Vec<Chunk>>;

    /// Delete the record and chunks of `path`. Returns whether a record existed.
    async fn remove_file(&self, path: &str) -> Result<bool>;

    /// Paths of every record at or below the directory `prefix`.
    async fn paths_under(&self, prefix: &str) -> Result<Vec<String>>;

    /// Records whose path contains `needle` (case-insensitive), newest first.
    async fn find_by_path(&self, needle: &str, limit: usize) -> Result<Vec<FileRecord>>;

    /// Records whose file type or language contains `needle`, newest first.
    async fn find_by_kind(&self, needle: &str, limit: usize) -> Result<Vec<FileRecord>>;

    /// All records ordered by path match, then code/documentation, then recency.
    async fn rank_all(&self, needle: &str, limit: usize) -> Result<Vec<FileRecord>>;

    async fn count_files(&self) -> Result<usize>;

    async fn count_files_under(&self, prefix: &str) -> Result<usize>;

    async fn summary(&self) -> Result<MetadataSummary>;

    async fn record_search(&self, entry: &SearchHistoryEntry) -> Result<()>;

    /// Most recent searches first.
    async fn recent_searches(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>>;
}

/// A vector entry matched by similarity.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredVector {
    pub entry: VectorEntry,
    pub score: f32,
}

/// Durable store of chunk vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn is_available(&self) -> bool;

    /// Add a batch. An entry with an existing `chunk_id` replaces it.
    async fn add(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// Drop every entry belonging to `path`.
    async fn remove_path(&self, path: &str) -> Result<usize>;

    async fn count(&self) -> Result<usize>;

    /// Best matches for `query` by cosine similarity, highest first.
    async fn search_similar(&self, query: &[f16], limit: usize) -> Result<Vec<ScoredVector>>;
}

/// The pair of stores shared by the indexer and the search engine.
#[derive(Clone)]
pub struct Stores {
    pub metadata: Arc<dyn MetadataStore>,
    pub vectors: Arc<dyn VectorStore>,
}

impl Stores {
    /// Open both stores under `data_dir`.
    ///
    /// Either store may fail on its own and is then replaced by its offline
    /// variant. Only when both fail is the error returned.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        match backup_metadata(data_dir).await {
            Ok(Some(backup)) => info!("Metadata backup written to {}", backup.display()),
            Ok(None) => debug!("No metadata database to back up yet"),
            Err(e) => warn!("Metadata backup failed, opening anyway: {:#}", e),
        }

        let metadata = SqliteMetadataStore::open(&data_dir.join(METADATA_DB)).await;
        let vectors = SqliteVectorStore::open(&data_dir.join(VECTOR_DB)).await;

        match (metadata, vectors) {
            (Ok(metadata), Ok(vectors)) => {
                info!("Opened stores in {}", data_dir.display());
                Ok(Self {
                    metadata: Arc::new(metadata),
                    vectors: Arc::new(vectors),
                })
            }
            (Ok(metadata), Err(e)) => {
                warn!("Vector store unavailable, continuing without vectors: {:#}", e);
                Ok(Self {
                    metadata: Arc::new(metadata),
                    vectors: Arc::new(DisabledVectorStore),
                })
            }
            (Err(e), Ok(vectors)) => {
                warn!("Metadata store unavailable, continuing offline: {:#}", e);
                Ok(Self {
                    metadata: Arc::new(OfflineMetadataStore),
                    vectors: Arc::new(vectors),
                })
            }
            (Err(metadata_err), Err(vector_err)) => Err(anyhow::anyhow!(
                "Both stores failed to open in {}: metadata: {:#}; vectors: {:#}",
                data_dir.display(),
                metadata_err,
                vector_err
            )),
        }
    }

    /// In-memory stores for tests and throwaway sessions.
    pub async fn open_memory() -> Result<Self> {
        Ok(Self {
            metadata: Arc::new(SqliteMetadataStore::open_memory().await?),
            vectors: Arc::new(SqliteVectorStore::open_memory().await?),
        })
    }
}

/// Copy the metadata database to `backups/database_backup_<timestamp>.sqlite`.
///
/// Returns `None` when there is no database yet.
pub async fn backup_metadata(data_dir: &Path) -> Result<Option<PathBuf>> {
    let source = data_dir.join(METADATA_DB);
    if !tokio::fs::try_exists(&source).await? {
        return Ok(None);
    }
    let backup_dir = data_dir.join(BACKUP_DIR);
    tokio::fs::create_dir_all(&backup_dir)
        .await
        .with_context(|| format!("Failed to create {}", backup_dir.display()))?;

    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
    let target = backup_dir.join(format!("database_backup_{stamp}.sqlite"));
    tokio::fs::copy(&source, &target)
        .await
        .with_context(|| format!("Failed to copy {} to {}", source.display(), target.display()))?;
    Ok(Some(target))
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_escape(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// `%term%`, escaped and lowercased.
pub(crate) fn contains_pattern(term: &str) -> String {
    format!("%{}%", like_escape(&term.to_lowercase()))
}

/// `dir` without trailing separators, and `dir/` for a case-sensitive
/// prefix test of everything strictly below it.
pub(crate) fn dir_prefix(dir: &str) -> (String, String) {
    let dir = dir.trim_end_matches(['/', '\\']);
    (dir.to_string(), format!("{dir}/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_like_patterns() {
        assert_eq!(contains_pattern("Config_File%"), "%config\\_file\\%%");
        assert_eq!(
            dir_prefix("/home/me/Code/"),
            ("/home/me/Code".to_string(), "/home/me/Code/".to_string())
        );
        assert_eq!(like_escape("a\\b"), "a\\\\b");
    }

    #[tokio::test]
    async fn test_open_creates_both_databases() -> Result<()> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join("data");
        let stores = Stores::open(&data_dir).await?;

        assert!(stores.metadata.is_available());
        assert!(stores.vectors.is_available());
        assert!(data_dir.join(METADATA_DB).exists());
        assert!(data_dir.join(VECTOR_DB).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_second_open_backs_up_metadata() -> Result<()> {
        let temp_dir = tempdir()?;
        let backups = temp_dir.path().join(BACKUP_DIR);

        drop(Stores::open(temp_dir.path()).await?);
        assert!(!backups.exists());

        drop(Stores::open(temp_dir.path()).await?);
        let names: Vec<String> = std::fs::read_dir(&backups)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<_>>()?;
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("database_backup_"));
        assert!(names[0].ends_with(".sqlite"));
        Ok(())
    }

    #[tokio::test]
    async fn test_backup_without_database_is_skipped() -> Result<()> {
        let temp_dir = tempdir()?;
        assert!(backup_metadata(temp_dir.path()).await?.is_none());
        assert!(!temp_dir.path().join(BACKUP_DIR).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_open_degrades_when_one_store_fails() -> Result<()> {
        let temp_dir = tempdir()?;
        // A directory where the vector database file should be makes it unopenable.
        std::fs::create_dir_all(temp_dir.path().join(VECTOR_DB))?;

        let stores = Stores::open(temp_dir.path()).await?;
        assert!(stores.metadata.is_available());
        assert!(!stores.vectors.is_available());
        Ok(())
    }

    #[tokio::test]
    async fn test_open_fails_when_both_stores_fail() -> Result<()> {
        let temp_dir = tempdir()?;
        std::fs::create_dir_all(temp_dir.path().join(METADATA_DB))?;
        std::fs::create_dir_all(temp_dir.path().join(VECTOR_DB))?;

        assert!(Stores::open(temp_dir.path()).await.is_err());
        Ok(())
    }
}
