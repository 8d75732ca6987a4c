//! The write path: files in, chunks, vectors and file records out.
//!
//! ## Pipeline Flow
//!
//! ```text
//! path → PathFilter → file_kind → ChangeDetector → ChunkingStrategy → ResilientEmbedder
//!                                                        │                    │
//!                                                  MetadataStore         VectorStore
//! ```
//!
//! ## Write order
//!
//! For every file that needs indexing:
//!
//! 1. Vectors are replaced best-effort. A vector store failure is logged and
//!    the file is still indexed.
//! 2. The chunk set is replaced in one transaction.
//! 3. The [`FileRecord`] is written last, so a record never points at a
//!    partial chunk set.
//!
//! At most one index operation per path runs at a time; distinct paths run
//! concurrently, bounded by `max_workers` during tree runs.

use super::analyzer::Analyzer;
use super::change_detector::{ChangeDetector, DEFAULT_FRESHNESS_HOURS, fingerprint};
use super::chunking_strategy::{ChunkingConfig, ChunkingStrategy, DEFAULT_MIN_CONTENT_CHARS};
use super::file_kind::{classify, is_text_file};
use super::path_filter::PathFilter;
use crate::storage::{FileRecord, MetadataStore, Stores, VectorEntry, VectorStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use singleton_context::DEFAULT_MAX_CHUNK_SIZE;
use singleton_embed::ResilientEmbedder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Refusing to index {0}: not inside an allowed folder")]
    UnsafeRoot(PathBuf),
    #[error("Path not found: {0}")]
    NotFound(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Configuration for the indexer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexerConfig {
    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,
    pub min_content_chars: usize,
    pub max_chunk_size: usize,
    /// Concurrent files during a tree run
    pub max_workers: usize,
    pub freshness_hours: i64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            min_content_chars: DEFAULT_MIN_CONTENT_CHARS,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_workers: 4,
            freshness_hours: DEFAULT_FRESHNESS_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    Ineligible,
    NotText,
    NotAFile,
    TooLarge { size: u64 },
    TooShort { chars: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileOutcome {
    Indexed { chunks: usize, vectors: usize },
    Unchanged,
    Skipped(SkipReason),
}

/// Result of one tree run
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeSummary {
    pub root: PathBuf,
    pub files_seen: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub chunks_written: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub chunks_created: usize,
    pub vectors_written: usize,
    pub errors: usize,
}

/// One async mutex per path ever indexed in this session.
#[derive(Default)]
struct PathLocks {
    inner: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            map.entry(path.to_path_buf()).or_default().clone()
        };
        entry.lock_owned().await
    }
}

pub struct Indexer {
    config: IndexerConfig,
    filter: PathFilter,
    detector: ChangeDetector,
    chunking: ChunkingStrategy,
    embedder: Arc<ResilientEmbedder>,
    metadata: Arc<dyn MetadataStore>,
    vectors: Arc<dyn VectorStore>,
    locks: PathLocks,
    stats: RwLock<ProcessingStats>,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("config", &self.config)
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

impl Indexer {
    pub fn new(
        config: IndexerConfig,
        filter: PathFilter,
        stores: &Stores,
        embedder: Arc<ResilientEmbedder>,
    ) -> Self {
        let chunking = ChunkingStrategy::new(
            ChunkingConfig::default()
                .with_max_chunk_size(config.max_chunk_size)
                .with_min_content_chars(config.min_content_chars),
        );
        Self {
            detector: ChangeDetector::new(stores.metadata.clone(), config.freshness_hours),
            chunking,
            filter,
            embedder,
            metadata: stores.metadata.clone(),
            vectors: stores.vectors.clone(),
            locks: PathLocks::default(),
            stats: RwLock::new(ProcessingStats::default()),
            config,
        }
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub async fn stats(&self) -> ProcessingStats {
        self.stats.read().await.clone()
    }

    /// Index a single file if it is eligible and has changed.
    ///
    /// Returns `Err` only for read or metadata store failures. Everything that
    /// makes a file uninteresting comes back as [`FileOutcome::Skipped`].
    pub async fn index_file(&self, path: &Path) -> Result<FileOutcome> {
        if !self.filter.is_eligible(path) {
            return Ok(FileOutcome::Skipped(SkipReason::Ineligible));
        }
        if !is_text_file(path) {
            return Ok(FileOutcome::Skipped(SkipReason::NotText));
        }

        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        if !metadata.is_file() {
            return Ok(FileOutcome::Skipped(SkipReason::NotAFile));
        }
        if metadata.len() > self.config.max_file_size {
            debug!("Skipping {} ({} bytes)", path.display(), metadata.len());
            return Ok(FileOutcome::Skipped(SkipReason::TooLarge {
                size: metadata.len(),
            }));
        }

        let _guard = self.locks.lock(path).await;
        let result = self.index_locked(path).await;
        if result.is_err() {
            self.stats.write().await.errors += 1;
        }
        result
    }

    async fn index_locked(&self, path: &Path) -> Result<FileOutcome> {
        let key = path.to_string_lossy().into_owned();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let content_hash = fingerprint(&bytes);

        let status = self.detector.check(&key, &content_hash).await;
        if !status.needs_indexing() {
            debug!("Unchanged: {}", key);
            return Ok(FileOutcome::Unchanged);
        }

        let text = String::from_utf8_lossy(&bytes);
        let kind = classify(path);
        let Some(chunks) = self.chunking.chunk_content(&key, &text, &kind) else {
            return Ok(FileOutcome::Skipped(SkipReason::TooShort {
                chars: ChunkingStrategy::content_chars(&text),
            }));
        };

        let vectors = self.write_vectors(&key, &chunks).await;

        self.metadata
            .replace_chunks(&key, &chunks)
            .await
            .with_context(|| format!("Failed to store chunks for {key}"))?;

        let record = FileRecord {
            path: key.clone(),
            content_hash,
            last_indexed_at: Utc::now(),
            size_bytes: bytes.len() as u64,
            file_type: kind.file_type,
            language: kind.language,
            chunk_count: chunks.len(),
        };
        self.metadata
            .upsert_file(&record)
            .await
            .with_context(|| format!("Failed to store file record for {key}"))?;

        {
            let mut stats = self.stats.write().await;
            stats.files_processed += 1;
            stats.chunks_created += chunks.len();
            stats.vectors_written += vectors;
        }

        debug!("Indexed {} ({:?}): {} chunks, {} vectors", key, status, chunks.len(), vectors);
        Ok(FileOutcome::Indexed {
            chunks: chunks.len(),
            vectors,
        })
    }

    /// Replace the vectors of `key`. Never fails; returns how many were written.
    async fn write_vectors(&self, key: &str, chunks: &[crate::storage::Chunk]) -> usize {
        if !self.vectors.is_available() {
            return 0;
        }

        let created_at = Utc::now();
        let mut entries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            entries.push(VectorEntry {
                vector: self.embedder.embed(&chunk.text_content).await,
                text: chunk.text_content.clone(),
                path: key.to_string(),
                chunk_id: chunk.chunk_id.clone(),
                file_type: chunk.file_type.clone(),
                language: chunk.language.clone(),
                created_at,
            });
        }

        let written = async {
            self.vectors.remove_path(key).await?;
            self.vectors.add(&entries).await
        };
        match written.await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to store vectors for {}: {:#}", key, e);
                0
            }
        }
    }

    /// Walk `root` depth-first and index every eligible file.
    ///
    /// Unreadable directories and entries are logged and skipped, and a failing
    /// file never stops the run.
    pub async fn index_tree(&self, root: &Path, recursive: bool) -> Result<TreeSummary, IndexError> {
        let started = Instant::now();
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|_| IndexError::NotFound(root.to_path_buf()))?;
        let is_dir = tokio::fs::metadata(&root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(IndexError::NotADirectory(root));
        }
        if !self.filter.is_safe_root(&root) {
            return Err(IndexError::UnsafeRoot(root));
        }

        info!("Indexing {} (recursive: {})", root.display(), recursive);
        let files = self.collect_files(&root, recursive).await;

        let mut summary = TreeSummary {
            root: root.clone(),
            files_seen: files.len(),
            ..TreeSummary::default()
        };

        let mut results = stream::iter(files)
            .map(|path| async move {
                let outcome = self.index_file(&path).await;
                (path, outcome)
            })
            .buffer_unordered(self.config.max_workers.max(1));

        while let Some((path, outcome)) = results.next().await {
            match outcome {
                Ok(FileOutcome::Indexed { chunks, .. }) => {
                    summary.indexed += 1;
                    summary.chunks_written += chunks;
                }
                Ok(FileOutcome::Unchanged) => summary.unchanged += 1,
                Ok(FileOutcome::Skipped(reason)) => {
                    debug!("Skipped {}: {:?}", path.display(), reason);
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!("Failed to index {}: {:#}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            "Indexed {}: {} new or changed, {} unchanged, {} skipped, {} failed in {:.2}s",
            root.display(),
            summary.indexed,
            summary.unchanged,
            summary.skipped,
            summary.failed,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    async fn collect_files(&self, root: &Path, recursive: bool) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut dir_stack = vec![(root.to_path_buf(), 0usize)];

        while let Some((current_dir, depth)) = dir_stack.pop() {
            let mut read_dir = match tokio::fs::read_dir(&current_dir).await {
                Ok(rd) => rd,
                Err(e) => {
                    warn!("Failed to read directory {}: {}", current_dir.display(), e);
                    continue;
                }
            };

            loop {
                let entry = match read_dir.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read entry in {}: {}", current_dir.display(), e);
                        break;
                    }
                };
                let path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("Failed to get metadata for {}: {}", path.display(), e);
                        continue;
                    }
                };

                if file_type.is_dir() {
                    let name = entry.file_name();
                    if recursive
                        && !self.filter.should_skip_directory(&name.to_string_lossy())
                        && self.filter.within_depth(depth + 1)
                    {
                        dir_stack.push((path, depth + 1));
                    }
                } else if file_type.is_file() {
                    files.push(path);
                }
            }
        }

        files
    }

    /// Retract the record, chunks and vectors of one file.
    pub async fn remove_file(&self, path: &Path) -> Result<bool> {
        let key = path.to_string_lossy().into_owned();
        let _guard = self.locks.lock(path).await;
        self.retract(&key).await
    }

    async fn retract(&self, key: &str) -> Result<bool> {
        if let Err(e) = self.vectors.remove_path(key).await {
            warn!("Failed to remove vectors for {}: {:#}", key, e);
        }
        let existed = self
            .metadata
            .remove_file(key)
            .await
            .with_context(|| format!("Failed to remove {key} from the index"))?;
        if existed {
            debug!("Removed {} from the index", key);
        }
        Ok(existed)
    }

    /// Retract every file recorded at or below `prefix`.
    pub async fn remove_tree(&self, prefix: &Path) -> Result<usize> {
        let key = prefix.to_string_lossy().into_owned();
        let paths = self.metadata.paths_under(&key).await?;
        let mut removed = 0;
        for path in paths {
            let _guard = self.locks.lock(Path::new(&path)).await;
            if self.retract(&path).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {} files under {} from the index", removed, key);
        }
        Ok(removed)
    }
}

#[async_trait]
impl Analyzer for Indexer {
    async fn analyze(&self, absolute_path: &Path) -> Result<()> {
        let outcome = self.index_file(absolute_path).await?;
        debug!("{}: {:?}", absolute_path.display(), outcome);
        Ok(())
    }

    async fn forget(&self, absolute_path: &Path) -> Result<()> {
        if self.remove_file(absolute_path).await? {
            return Ok(());
        }
        // No record of its own: it may have been a directory.
        self.remove_tree(absolute_path).await?;
        Ok(())
    }
}
