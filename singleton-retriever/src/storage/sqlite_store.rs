//! SQLite implementation of [`MetadataStore`]
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE files (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     file_path TEXT UNIQUE NOT NULL,
//!     content_hash TEXT NOT NULL,        -- hex blake3
//!     last_indexed INTEGER NOT NULL,     -- unix millis
//!     file_size INTEGER NOT NULL,
//!     file_type TEXT NOT NULL,
//!     language TEXT NOT NULL,
//!     chunk_count INTEGER NOT NULL
//! );
//!
//! CREATE TABLE chunks (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     file_path TEXT NOT NULL,
//!     chunk_id TEXT NOT NULL,
//!     text_content TEXT NOT NULL,
//!     file_type TEXT NOT NULL,
//!     language TEXT NOT NULL,
//!     created_at TIMESTAMP NOT NULL,
//!     UNIQUE(file_path, chunk_id)
//! );
//!
//! CREATE TABLE search_history (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     query TEXT NOT NULL,
//!     results_count INTEGER NOT NULL,
//!     search_type TEXT NOT NULL,
//!     created_at TIMESTAMP NOT NULL
//! );
//! ```
//!
//! Chunks are keyed by path rather than by a foreign key on `files`, because
//! the file record is written only after its chunks.

use super::{
    Chunk, FileRecord, MetadataStore, MetadataSummary, SearchHistoryEntry, contains_pattern,
    dir_prefix,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

const FILE_COLUMNS: &str =
    "file_path, content_hash, last_indexed, file_size, file_type, language, chunk_count";

/// Metadata store over a single SQLite database.
#[derive(Clone, Debug)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
    db_path: Option<PathBuf>,
}

impl SqliteMetadataStore {
    /// Open (creating if needed) the database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .create_if_missing(true),
        )
        .await
        .with_context(|| format!("Failed to open metadata database {}", db_path.display()))?;
        Self::new_with_pool(pool, Some(db_path.to_path_buf())).await
    }

    /// In-memory database. One connection, kept for the lifetime of the pool.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool, None).await
    }

    async fn new_with_pool(pool: SqlitePool, db_path: Option<PathBuf>) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool, db_path })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT UNIQUE NOT NULL,
                content_hash TEXT NOT NULL,
                last_indexed INTEGER NOT NULL,
                file_size INTEGER NOT NULL,
                file_type TEXT NOT NULL,
                language TEXT NOT NULL,
                chunk_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                text_content TEXT NOT NULL,
                file_type TEXT NOT NULL,
                language TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                CONSTRAINT unique_chunk UNIQUE(file_path, chunk_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL,
                results_count INTEGER NOT NULL,
                search_type TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_path ON chunks(file_path)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_last_indexed ON files(last_indexed)")
            .execute(pool)
            .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn file_from_row(row: &SqliteRow) -> FileRecord {
        let last_indexed: i64 = row.get("last_indexed");
        let file_size: i64 = row.get("file_size");
        let chunk_count: i64 = row.get("chunk_count");
        FileRecord {
            path: row.get("file_path"),
            content_hash: row.get("content_hash"),
            last_indexed_at: DateTime::from_timestamp_millis(last_indexed).unwrap_or_default(),
            size_bytes: file_size.max(0) as u64,
            file_type: row.get("file_type"),
            language: row.get("language"),
            chunk_count: chunk_count.max(0) as usize,
        }
    }

    async fn fetch_files(&self, sql: &str, pattern: &str, limit: usize) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(sql)
            .bind(pattern)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::file_from_row).collect())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    fn is_available(&self) -> bool {
        true
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn upsert_file(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (file_path, content_hash, last_indexed, file_size, file_type, language, chunk_count)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_path) DO UPDATE SET
                content_hash = excluded.content_hash,
                last_indexed = excluded.last_indexed,
                file_size = excluded.file_size,
                file_type = excluded.file_type,
                language = excluded.language,
                chunk_count = excluded.chunk_count
            "#,
        )
        .bind(&record.path)
        .bind(&record.content_hash)
        .bind(record.last_indexed_at.timestamp_millis())
        .bind(record.size_bytes as i64)
        .bind(&record.file_type)
        .bind(&record.language)
        .bind(record.chunk_count as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(&format!("SELECT {FILE_COLUMNS} FROM files WHERE file_path = ?"))
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::file_from_row))
    }

    async fn replace_chunks(&self, path: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE file_path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO chunks (file_path, chunk_id, text_content, file_type, language, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(path)
            .bind(&chunk.chunk_id)
            .bind(&chunk.text_content)
            .bind(&chunk.file_type)
            .bind(&chunk.language)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_chunks(&self, path: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT file_path, chunk_id, text_content, file_type, language
             FROM chunks WHERE file_path = ? ORDER BY id",
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Chunk {
                file_path: row.get("file_path"),
                chunk_id: row.get("chunk_id"),
                text_content: row.get("text_content"),
                file_type: row.get("file_type"),
                language: row.get("language"),
            })
            .collect())
    }

    async fn remove_file(&self, path: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE file_path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM files WHERE file_path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn paths_under(&self, prefix: &str) -> Result<Vec<String>> {
        let (dir, below) = dir_prefix(prefix);
        let rows = sqlx::query(
            "SELECT file_path FROM files
             WHERE file_path = ?1 OR substr(file_path, 1, length(?2)) = ?2
             ORDER BY file_path",
        )
        .bind(dir)
        .bind(below)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("file_path")).collect())
    }

    async fn find_by_path(&self, needle: &str, limit: usize) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE lower(file_path) LIKE ? ESCAPE '\\'
             ORDER BY last_indexed DESC LIMIT ?"
        );
        self.fetch_files(&sql, &contains_pattern(needle), limit).await
    }

    async fn find_by_kind(&self, needle: &str, limit: usize) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE lower(file_type) LIKE ?1 ESCAPE '\\' OR lower(language) LIKE ?1 ESCAPE '\\'
             ORDER BY last_indexed DESC LIMIT ?2"
        );
        self.fetch_files(&sql, &contains_pattern(needle), limit).await
    }

    async fn rank_all(&self, needle: &str, limit: usize) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             ORDER BY
                CASE
                    WHEN lower(file_path) LIKE ?1 ESCAPE '\\' THEN 1
                    WHEN file_type IN ('code', 'documentation') THEN 2
                    ELSE 3
                END,
                last_indexed DESC
             LIMIT ?2"
        );
        self.fetch_files(&sql, &contains_pattern(needle), limit).await
    }

    async fn count_files(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn count_files_under(&self, prefix: &str) -> Result<usize> {
        let (dir, below) = dir_prefix(prefix);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files
             WHERE file_path = ?1 OR substr(file_path, 1, length(?2)) = ?2",
        )
        .bind(dir)
        .bind(below)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    async fn summary(&self) -> Result<MetadataSummary> {
        let total_files = self.count_files().await?;
        let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let last_indexed: Option<i64> = sqlx::query_scalar("SELECT MAX(last_indexed) FROM files")
            .fetch_one(&self.pool)
            .await?;
        let indexed_types: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT file_type FROM files ORDER BY file_type")
                .fetch_all(&self.pool)
                .await?;

        let database_size_bytes = match &self.db_path {
            Some(path) => tokio::fs::metadata(path).await.ok().map(|m| m.len()),
            None => None,
        };

        Ok(MetadataSummary {
            total_files,
            total_chunks: total_chunks as usize,
            last_updated: last_indexed.and_then(DateTime::from_timestamp_millis),
            indexed_types,
            database_size_bytes,
        })
    }

    async fn record_search(&self, entry: &SearchHistoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO search_history (query, results_count, search_type, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.query)
        .bind(entry.results_count as i64)
        .bind(&entry.search_type)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_searches(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT query, results_count, search_type, created_at
             FROM search_history ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let results_count: i64 = row.get("results_count");
                SearchHistoryEntry {
                    query: row.get("query"),
                    results_count: results_count.max(0) as usize,
                    search_type: row.get("search_type"),
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(path: &str, file_type: &str, language: &str, age_minutes: i64) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            content_hash: blake3::hash(path.as_bytes()).to_hex().to_string(),
            last_indexed_at: Utc::now() - Duration::minutes(age_minutes),
            size_bytes: 42,
            file_type: file_type.to_string(),
            language: language.to_string(),
            chunk_count: 1,
        }
    }

    fn chunk(path: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            file_path: path.to_string(),
            chunk_id: singleton_context::chunk_id(path, index),
            text_content: text.to_string(),
            file_type: "code".to_string(),
            language: "rust".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_path() -> Result<()> {
        let store = SqliteMetadataStore::open_memory().await?;
        let mut rec = record("/home/me/Code/a.rs", "code", "rust", 5);
        store.upsert_file(&rec).await?;

        rec.content_hash = "changed".to_string();
        rec.chunk_count = 3;
        store.upsert_file(&rec).await?;

        assert_eq!(store.count_files().await?, 1);
        let stored = store.get_file("/home/me/Code/a.rs").await?.unwrap();
        assert_eq!(stored.content_hash, "changed");
        assert_eq!(stored.chunk_count, 3);
        assert_eq!(
            stored.last_indexed_at.timestamp_millis(),
            rec.last_indexed_at.timestamp_millis()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_chunks_drops_stale_ids() -> Result<()> {
        let store = SqliteMetadataStore::open_memory().await?;
        let path = "/home/me/Code/a.rs";
        store
            .replace_chunks(path, &[chunk(path, 0, "one."), chunk(path, 1, "two.")])
            .await?;
        store.replace_chunks(path, &[chunk(path, 0, "only.")]).await?;

        let chunks = store.get_chunks(path).await?;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text_content, "only.");
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_path_is_case_insensitive_and_escaped() -> Result<()> {
        let store = SqliteMetadataStore::open_memory().await?;
        store
            .upsert_file(&record("/home/me/Code/Config.json", "data", "json", 10))
            .await?;
        store
            .upsert_file(&record("/home/me/Code/my_config.toml", "config", "toml", 1))
            .await?;
        store
            .upsert_file(&record("/home/me/Code/myXconfig.toml", "config", "toml", 1))
            .await?;

        let found = store.find_by_path("CONFIG", 5).await?;
        assert_eq!(found.len(), 3);

        let underscored = store.find_by_path("my_config", 5).await?;
        assert_eq!(underscored.len(), 1);
        assert!(underscored[0].path.ends_with("my_config.toml"));
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_kind_matches_type_or_language() -> Result<()> {
        let store = SqliteMetadataStore::open_memory().await?;
        store
            .upsert_file(&record("/home/me/Code/a.rs", "code", "rust", 1))
            .await?;
        store
            .upsert_file(&record("/home/me/Code/b.md", "documentation", "markdown", 1))
            .await?;

        assert_eq!(store.find_by_kind("rust", 10).await?.len(), 1);
        assert_eq!(store.find_by_kind("DOC", 10).await?.len(), 1);
        assert!(store.find_by_kind("python", 10).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_rank_all_ordering() -> Result<()> {
        let store = SqliteMetadataStore::open_memory().await?;
        store
            .upsert_file(&record("/home/me/Code/data.csv", "unknown", "unknown", 0))
            .await?;
        store
            .upsert_file(&record("/home/me/Code/old.rs", "code", "rust", 60))
            .await?;
        store
            .upsert_file(&record("/home/me/Code/new.md", "documentation", "markdown", 1))
            .await?;
        store
            .upsert_file(&record("/home/me/Code/widget.txt", "text", "plain", 120))
            .await?;

        let ranked: Vec<String> = store
            .rank_all("widget", 15)
            .await?
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(
            ranked,
            vec![
                "/home/me/Code/widget.txt",
                "/home/me/Code/new.md",
                "/home/me/Code/old.rs",
                "/home/me/Code/data.csv",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_and_prefix_queries() -> Result<()> {
        let store = SqliteMetadataStore::open_memory().await?;
        for path in [
            "/home/me/Code/app/a.rs",
            "/home/me/Code/app/sub/b.rs",
            "/home/me/Code/application.rs",
        ] {
            store.upsert_file(&record(path, "code", "rust", 1)).await?;
            store.replace_chunks(path, &[chunk(path, 0, "x.")]).await?;
        }

        assert_eq!(store.count_files_under("/home/me/Code/app").await?, 2);
        assert_eq!(
            store.paths_under("/home/me/Code/app/").await?,
            vec!["/home/me/Code/app/a.rs", "/home/me/Code/app/sub/b.rs"]
        );

        assert!(store.remove_file("/home/me/Code/app/a.rs").await?);
        assert!(!store.remove_file("/home/me/Code/app/a.rs").await?);
        assert!(store.get_chunks("/home/me/Code/app/a.rs").await?.is_empty());
        assert_eq!(store.count_files().await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_prefix_queries_are_case_sensitive() -> Result<()> {
        let store = SqliteMetadataStore::open_memory().await?;
        for path in ["/home/me/Code/Docs/a.md", "/home/me/Code/docs/b.md", "/home/me/Code/docs_x.md"] {
            store.upsert_file(&record(path, "documentation", "markdown", 1)).await?;
        }

        assert_eq!(store.count_files_under("/home/me/Code/Docs").await?, 1);
        assert_eq!(store.paths_under("/home/me/Code/docs").await?, vec!["/home/me/Code/docs/b.md"]);
        assert_eq!(store.count_files_under("/home/me/Code/docs/b.md").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_and_history() -> Result<()> {
        let store = SqliteMetadataStore::open_memory().await?;
        let empty = store.summary().await?;
        assert_eq!(empty.total_files, 0);
        assert_eq!(empty.last_updated, None);

        store
            .upsert_file(&record("/home/me/Code/a.rs", "code", "rust", 1))
            .await?;
        store
            .upsert_file(&record("/home/me/Code/b.md", "documentation", "markdown", 1))
            .await?;
        store
            .replace_chunks("/home/me/Code/a.rs", &[chunk("/home/me/Code/a.rs", 0, "a.")])
            .await?;

        let summary = store.summary().await?;
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.total_chunks, 1);
        assert_eq!(summary.indexed_types, vec!["code", "documentation"]);
        assert!(summary.last_updated.is_some());

        store
            .record_search(&SearchHistoryEntry::new("first", 2, "hybrid"))
            .await?;
        store
            .record_search(&SearchHistoryEntry::new("second", 0, "hybrid"))
            .await?;
        let history = store.recent_searches(10).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].query, "second");
        assert_eq!(history[1].results_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_database_reports_size() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = SqliteMetadataStore::open(&temp_dir.path().join("singleton.db")).await?;
        assert!(store.health_check().await);
        assert!(store.summary().await?.database_size_bytes.is_some());
        Ok(())
    }
}
