//! SQLite-backed [`VectorStore`] with in-process cosine similarity
//!
//! Vectors are stored as raw little-endian f16 blobs. Similarity search loads
//! the candidate rows and scores them in Rust; corpora of a local file tree
//! are small enough for a linear scan.

use super::{ScoredVector, VectorEntry, VectorStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use half::f16;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

#[derive(Clone, Debug)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .create_if_missing(true)
                .page_size(1 << 16),
        )
        .await
        .with_context(|| format!("Failed to open vector database {}", db_path.display()))?;
        Self::new_with_pool(pool).await
    }

    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_vectors (
                chunk_id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                text TEXT NOT NULL,
                file_type TEXT NOT NULL,
                language TEXT NOT NULL,
                vector BLOB NOT NULL,
                dimension INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_file_vectors_path ON file_vectors(path)")
            .execute(&pool)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn is_available(&self) -> bool {
        true
    }

    async fn add(&self, entries: &[VectorEntry]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            let blob: &[u8] = bytemuck::cast_slice(&entry.vector);
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO file_vectors
                    (chunk_id, path, text, file_type, language, vector, dimension, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.chunk_id)
            .bind(&entry.path)
            .bind(&entry.text)
            .bind(&entry.file_type)
            .bind(&entry.language)
            .bind(blob)
            .bind(entry.vector.len() as i64)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(entries.len())
    }

    async fn remove_path(&self, path: &str) -> Result<usize> {
        let removed = sqlx::query("DELETE FROM file_vectors WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed as usize)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn search_similar(&self, query: &[f16], limit: usize) -> Result<Vec<ScoredVector>> {
        let rows = sqlx::query(
            "SELECT chunk_id, path, text, file_type, language, vector, created_at
             FROM file_vectors WHERE dimension = ?",
        )
        .bind(query.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ScoredVector> = rows
            .iter()
            .map(|row| {
                let bytes: Vec<u8> = row.get("vector");
                let vector: Vec<f16> = bytes
                    .chunks_exact(2)
                    .map(|pair| f16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let score = cosine_similarity(query, &vector);
                ScoredVector {
                    entry: VectorEntry {
                        vector,
                        text: row.get("text"),
                        path: row.get("path"),
                        chunk_id: row.get("chunk_id"),
                        file_type: row.get("file_type"),
                        language: row.get("language"),
                        created_at: row.get("created_at"),
                    },
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Cosine similarity of two f16 vectors, accumulated in f32.
/// Mismatched lengths or a zero vector score 0.
pub fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            let (x, y) = (x.to_f32(), y.to_f32());
            (dot + x * y, na + x * x, nb + y * y)
        });

    let norm = norm_a.sqrt() * norm_b.sqrt();
    if norm == 0.0 { 0.0 } else { dot / norm }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(path: &str, chunk_id: &str, values: &[f32]) -> VectorEntry {
        VectorEntry {
            vector: values.iter().copied().map(f16::from_f32).collect(),
            text: format!("text of {chunk_id}"),
            path: path.to_string(),
            chunk_id: chunk_id.to_string(),
            file_type: "code".to_string(),
            language: "rust".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_add_replace_and_remove() -> Result<()> {
        let store = SqliteVectorStore::open_memory().await?;
        store
            .add(&[
                entry("/a.rs", "/a.rs_chunk_0", &[1.0, 0.0]),
                entry("/a.rs", "/a.rs_chunk_1", &[0.0, 1.0]),
            ])
            .await?;
        store.add(&[entry("/a.rs", "/a.rs_chunk_0", &[0.5, 0.5])]).await?;
        store.add(&[entry("/b.rs", "/b.rs_chunk_0", &[1.0, 1.0])]).await?;
        assert_eq!(store.count().await?, 3);

        assert_eq!(store.remove_path("/a.rs").await?, 2);
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_similar_orders_by_score() -> Result<()> {
        let store = SqliteVectorStore::open_memory().await?;
        store
            .add(&[
                entry("/near.rs", "near", &[0.9, 0.1, 0.0]),
                entry("/far.rs", "far", &[0.0, 0.0, 1.0]),
                entry("/mid.rs", "mid", &[0.5, 0.5, 0.0]),
                entry("/other.rs", "other-dim", &[1.0, 0.0]),
            ])
            .await?;

        let query: Vec<f16> = [1.0, 0.0, 0.0].into_iter().map(f16::from_f32).collect();
        let results = store.search_similar(&query, 2).await?;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.chunk_id, "near");
        assert_eq!(results[1].entry.chunk_id, "mid");
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].entry.vector.len(), 3);
        Ok(())
    }

    #[test]
    fn test_cosine_similarity() {
        let v = |values: &[f32]| values.iter().copied().map(f16::from_f32).collect::<Vec<_>>();

        assert!((cosine_similarity(&v(&[1.0, 0.0, 0.0]), &v(&[1.0, 0.0, 0.0])) - 1.0).abs() < 1e-3);
        assert_eq!(cosine_similarity(&v(&[1.0, 0.0]), &v(&[0.0, 1.0])), 0.0);
        assert!((cosine_similarity(&v(&[1.0, 0.0]), &v(&[-1.0, 0.0])) + 1.0).abs() < 1e-3);
        assert!((cosine_similarity(&v(&[0.6, 0.8]), &v(&[0.8, 0.6])) - 0.96).abs() < 0.01);
        assert_eq!(cosine_similarity(&v(&[0.0, 0.0]), &v(&[1.0, 1.0])), 0.0);
        assert_eq!(cosine_similarity(&v(&[1.0, 2.0]), &v(&[1.0, 2.0, 3.0])), 0.0);
    }
}
