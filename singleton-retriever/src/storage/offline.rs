//! Stand-ins used when a store failed to open
//!
//! Writes succeed without effect and reads come back empty, so the indexer and
//! the search engine run unchanged against whichever store survived.

use super::{
    Chunk, FileRecord, MetadataStore, MetadataSummary, ScoredVector, SearchHistoryEntry,
    VectorEntry, VectorStore,
};
use anyhow::Result;
use async_trait::async_trait;
use half::f16;

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineMetadataStore;

#[async_trait]
impl MetadataStore for OfflineMetadataStore {
    fn is_available(&self) -> bool {
        false
    }

    async fn health_check(&self) -> bool {
        false
    }

    async fn upsert_file(&self, _record: &FileRecord) -> Result<()> {
        Ok(())
    }

    async fn get_file(&self, _path: &str) -> Result<Option<FileRecord>> {
        Ok(None)
    }

    async fn replace_chunks(&self, _path: &str, _chunks: &[Chunk]) -> Result<()> {
        Ok(())
    }

    async fn get_chunks(&self, _path: &str) -> Result<Vec<Chunk>> {
        Ok(Vec::new())
    }

    async fn remove_file(&self, _path: &str) -> Result<bool> {
        Ok(false)
    }

    async fn paths_under(&self, _prefix: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn find_by_path(&self, _needle: &str, _limit: usize) -> Result<Vec<FileRecord>> {
        Ok(Vec::new())
    }

    async fn find_by_kind(&self, _needle: &str, _limit: usize) -> Result<Vec<FileRecord>> {
        Ok(Vec::new())
    }

    async fn rank_all(&self, _needle: &str, _limit: usize) -> Result<Vec<FileRecord>> {
        Ok(Vec::new())
    }

    async fn count_files(&self) -> Result<usize> {
        Ok(0)
    }

    async fn count_files_under(&self, _prefix: &str) -> Result<usize> {
        Ok(0)
    }

    async fn summary(&self) -> Result<MetadataSummary> {
        Ok(MetadataSummary::default())
    }

    async fn record_search(&self, _entry: &SearchHistoryEntry) -> Result<()> {
        Ok(())
    }

    async fn recent_searches(&self, _limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledVectorStore;

#[async_trait]
impl VectorStore for DisabledVectorStore {
    fn is_available(&self) -> bool {
        false
    }

    async fn add(&self, _entries: &[VectorEntry]) -> Result<usize> {
        Ok(0)
    }

    async fn remove_path(&self, _path: &str) -> Result<usize> {
        Ok(0)
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }

    async fn search_similar(&self, _query: &[f16], _limit: usize) -> Result<Vec<ScoredVector>> {
        Ok(Vec::new())
    }
}
