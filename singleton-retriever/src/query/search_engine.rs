//! Ranked file search over the metadata store
//!
//! ## The cascade
//!
//! 1. **Exact**: the query is a case-insensitive substring of the path,
//!    newest first, at most 5.
//! 2. **Type**: only when phase 1 found fewer than 3. The query matches the
//!    file type or language, at most 10 more.
//! 3. **General**: only when fewer than 5 so far. Every file, path matches
//!    first, then code and documentation, then recency, at most 15 more.
//!
//! Candidates are deduplicated by path (first wins) and cut to 10. Each one is
//! re-read from disk and scored: 10 when the file name contains the query,
//! plus one per literal occurrence in the content. A candidate with no literal
//! match keeps a score of 1, since metadata already judged it relevant.
//! Files that vanished from disk are dropped.
//!
//! The result is never empty. When there is nothing to return a single
//! sentinel result explains why; its path starts with [`SENTINEL_PREFIX`].

use crate::storage::{FileRecord, MetadataStore, SearchHistoryEntry, Stores, VectorStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use serde::Serialize;
use singleton_embed::ResilientEmbedder;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub const SENTINEL_PREFIX: &str = "sentinel:";
pub const NO_DATABASE: &str = "sentinel:no-database";
pub const NO_FILES: &str = "sentinel:no-files";
pub const NO_RESULTS: &str = "sentinel:no-results";

pub const SEARCH_TYPE: &str = "hybrid";

const EXACT_LIMIT: usize = 5;
const TYPE_LIMIT: usize = 10;
const GENERAL_LIMIT: usize = 15;
const TYPE_PHASE_BELOW: usize = 3;
const GENERAL_PHASE_BELOW: usize = 5;
const WORKING_SET: usize = 10;
const READ_CONCURRENCY: usize = 8;

const PREVIEW_LINES: usize = 15;
const MATCHED_HEAD_CHARS: usize = 600;
const UNMATCHED_HEAD_CHARS: usize = 400;
const STRUCTURAL_MARKERS: &[&str] = &[
    "import", "export", "interface", "class", "function", "fn ", "def ", "struct ",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    Exact,
    Type,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub path: String,
    pub text: String,
    pub file_type: String,
    pub language: String,
    pub size_bytes: u64,
    pub indexed_at: Option<DateTime<Utc>>,
    pub relevance_score: usize,
    pub phase: Option<SearchPhase>,
}

impl SearchResult {
    fn sentinel(path: &str, text: String) -> Self {
        Self {
            path: path.to_string(),
            text,
            file_type: String::new(),
            language: String::new(),
            size_bytes: 0,
            indexed_at: None,
            relevance_score: 0,
            phase: None,
        }
    }

    /// Sentinels describe an empty outcome and are not files.
    pub fn is_sentinel(&self) -> bool {
        self.path.starts_with(SENTINEL_PREFIX)
    }

    pub fn file_name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }
}

/// A chunk found by vector similarity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarChunk {
    pub path: String,
    pub chunk_id: String,
    pub text: String,
    pub score: f32,
}

fn head(content: &str, chars: usize) -> String {
    let mut excerpt: String = content.chars().take(chars).collect();
    excerpt.push_str("...");
    excerpt
}

fn extend_phase(
    candidates: &mut Vec<(FileRecord, SearchPhase)>,
    phase: SearchPhase,
    found: Result<Vec<FileRecord>>,
) {
    match found {
        Ok(records) => candidates.extend(records.into_iter().map(|r| (r, phase))),
        Err(e) => warn!("{:?} search phase failed: {:#}", phase, e),
    }
}

/// Score `content` of the file `file_name` against `query` and build its
/// preview. Matching is literal and case-insensitive.
pub fn score_content(file_name: &str, content: &str, query: &str) -> (usize, String) {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return (1, head(content, UNMATCHED_HEAD_CHARS));
    }

    let name_match = file_name.to_lowercase().contains(&needle);
    let occurrences = content.to_lowercase().matches(needle.as_str()).count();
    if !name_match && occurrences == 0 {
        return (1, head(content, UNMATCHED_HEAD_CHARS));
    }

    let score = if name_match { 10 } else { 0 } + occurrences;
    let notable: Vec<&str> = content
        .lines()
        .filter(|line| {
            line.to_lowercase().contains(&needle)
                || STRUCTURAL_MARKERS.iter().any(|marker| line.contains(marker))
        })
        .take(PREVIEW_LINES)
        .collect();
    let preview = if notable.is_empty() {
        head(content, MATCHED_HEAD_CHARS)
    } else {
        notable.join("\n")
    };
    (score, preview)
}

#[derive(Clone)]
pub struct SearchEngine {
    metadata: Arc<dyn MetadataStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<ResilientEmbedder>,
}

impl SearchEngine {
    pub fn new(stores: &Stores, embedder: Arc<ResilientEmbedder>) -> Self {
        Self {
            metadata: stores.metadata.clone(),
            vectors: stores.vectors.clone(),
            embedder,
        }
    }

    /// Run the cascade for `query`. Never empty and never an error.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        let results = self.run(query).await;

        let genuine = results.iter().filter(|r| !r.is_sentinel()).count();
        let entry = SearchHistoryEntry::new(query, genuine, SEARCH_TYPE);
        if let Err(e) = self.metadata.record_search(&entry).await {
            warn!("Failed to record search history: {:#}", e);
        }
        results
    }

    async fn run(&self, query: &str) -> Vec<SearchResult> {
        if !self.metadata.is_available() {
            return vec![SearchResult::sentinel(
                NO_DATABASE,
                "❌ The index database is not available. Searching is disabled until it opens."
                    .to_string(),
            )];
        }

        let total_files = match self.metadata.count_files().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to count indexed files: {:#}", e);
                return vec![SearchResult::sentinel(
                    NO_DATABASE,
                    format!("❌ The index database could not be read: {e:#}"),
                )];
            }
        };
        if total_files == 0 {
            return vec![SearchResult::sentinel(
                NO_FILES,
                "❌ No files are indexed yet. Index a folder first, for example \"folder: my-project\"."
                    .to_string(),
            )];
        }

        let term = query.trim();
        let candidates: Vec<(FileRecord, SearchPhase)> = self
            .cascade(term)
            .await
            .into_iter()
            .unique_by(|(record, _)| record.path.clone())
            .take(WORKING_SET)
            .collect();
        debug!("{} candidates for {:?}", candidates.len(), term);

        let mut results: Vec<SearchResult> = stream::iter(candidates)
            .map(|(record, phase)| Self::read_candidate(record, phase, term))
            .buffered(READ_CONCURRENCY)
            .filter_map(|result| async move { result })
            .collect()
            .await;
        results.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

        if results.is_empty() {
            return vec![SearchResult::sentinel(
                NO_RESULTS,
                format!(
                    "🔍 No files found for \"{query}\".\n\n📊 {total_files} files are indexed.\n\n\
                     Try:\n📁 an exact file name (e.g. \"database.ts\")\n\
                     📁 a file type (e.g. \"code\", \"documentation\")\n\
                     📁 a language (e.g. \"typescript\", \"rust\")\n\
                     📁 a code fragment (e.g. \"function\", \"class\")"
                ),
            )];
        }
        results
    }

    async fn cascade(&self, term: &str) -> Vec<(FileRecord, SearchPhase)> {
        let mut candidates = Vec::new();
        extend_phase(
            &mut candidates,
            SearchPhase::Exact,
            self.metadata.find_by_path(term, EXACT_LIMIT).await,
        );
        if candidates.len() < TYPE_PHASE_BELOW {
            extend_phase(
                &mut candidates,
                SearchPhase::Type,
                self.metadata.find_by_kind(term, TYPE_LIMIT).await,
            );
        }
        if candidates.len() < GENERAL_PHASE_BELOW {
            extend_phase(
                &mut candidates,
                SearchPhase::General,
                self.metadata.rank_all(term, GENERAL_LIMIT).await,
            );
        }
        candidates
    }

    async fn read_candidate(record: FileRecord, phase: SearchPhase, term: &str) -> Option<SearchResult> {
        let bytes = match tokio::fs::read(&record.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Indexed file is gone: {}", record.path);
                return None;
            }
            Err(e) => {
                warn!("Failed to read {}: {}", record.path, e);
                return None;
            }
        };
        let content = String::from_utf8_lossy(&bytes);
        let name = Path::new(&record.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (score, preview) = score_content(&name, &content, term);

        Some(SearchResult {
            text: format!(
                "📄 {} ({}/{})\n\n{}",
                name, record.file_type, record.language, preview
            ),
            path: record.path,
            file_type: record.file_type,
            language: record.language,
            size_bytes: record.size_bytes,
            indexed_at: Some(record.last_indexed_at),
            relevance_score: score,
            phase: Some(phase),
        })
    }

    /// Semantic lookup: the chunks whose vectors are closest to `text`.
    pub async fn similar(&self, text: &str, limit: usize) -> Result<Vec<SimilarChunk>> {
        if !self.vectors.is_available() {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(text).await;
        let matches = self.vectors.search_similar(&query, limit).await?;
        Ok(matches
            .into_iter()
            .map(|m| SimilarChunk {
                path: m.entry.path,
                chunk_id: m.entry.chunk_id,
                text: m.entry.text,
                score: m.score,
            })
            .collect())
    }

    pub async fn recent_searches(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        self.metadata.recent_searches(limit).await
    }
}
