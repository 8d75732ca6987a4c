//! Turns one raw query into a list of answer entries
//!
//! Commands (help, stats, folder and file indexing) are answered directly.
//! Everything else is searched, and the results go to the responder with
//! the mode chosen by the intent classifier.

use crate::config::SearchConfig;
use crate::intent::IntentClassifier;
use crate::responder::{Responder, ResponseMode};
use anyhow::Result;
use serde::Serialize;
use singleton_retriever::query::router::strip_quotes;
use singleton_retriever::{
    FileOutcome, IndexError, Indexer, QueryRouter, Route, SearchEngine, SearchResult, SkipReason,
    StoreStats, Stores, home_dir,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Answer,
    FileResult,
    Guidance,
    IndexReport,
    Stats,
    Help,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerEntry {
    pub kind: EntryKind,
    pub title: String,
    pub text: String,
    pub score: Option<usize>,
    pub path: Option<String>,
}

impl AnswerEntry {
    fn new(kind: EntryKind, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            text: text.into(),
            score: None,
            path: None,
        }
    }

    fn file_result(result: &SearchResult) -> Self {
        Self {
            kind: EntryKind::FileResult,
            title: format!("📄 {}", result.file_name()),
            text: result.text.clone(),
            score: Some(result.relevance_score),
            path: Some(result.path.clone()),
        }
    }
}

/// Where a folder or file target was looked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(PathBuf),
    Missing { tried: Vec<PathBuf> },
}

const HELP_TEXT: &str = "\
💡 Singleton commands

🔍 Search: type any text, for example \"database connection\" or \"config.json\".
📁 Index a folder: \"folder: my-project\" (also index:, project:, klasör:).
📄 Index a file: \"file: notes.md\" (also dosya:).
📊 Statistics: \"stats\".
❓ This help: \"help\" or \"?\".

Relative folder and file names are looked up in your Desktop, Documents,
Downloads, Projects, Code and Development folders, then in your home folder.";

pub struct Orchestrator {
    router: QueryRouter,
    intents: IntentClassifier,
    indexer: Arc<Indexer>,
    engine: SearchEngine,
    stores: Stores,
    responder: Arc<dyn Responder>,
    search: SearchConfig,
}

impl Orchestrator {
    pub fn new(
        router: QueryRouter,
        indexer: Arc<Indexer>,
        engine: SearchEngine,
        stores: Stores,
        responder: Arc<dyn Responder>,
        search: SearchConfig,
    ) -> Result<Self> {
        Ok(Self {
            router,
            intents: IntentClassifier::new()?,
            indexer,
            engine,
            stores,
            responder,
            search,
        })
    }

    pub fn responder(&self) -> &Arc<dyn Responder> {
        &self.responder
    }

    pub async fn answer(&self, query: &str) -> Vec<AnswerEntry> {
        let route = self.router.classify(query);
        debug!("Routed {:?} to {:?}", query, route);
        match route {
            Route::Help => vec![AnswerEntry::new(EntryKind::Help, "💡 Help", HELP_TEXT)],
            Route::Stats => vec![self.stats().await],
            Route::IndexFolder { target } => vec![self.index_folder(&target).await],
            Route::IndexFile { target } => vec![self.index_file(&target).await],
            Route::Search { query } => self.search(&query).await,
        }
    }

    /// Resolve a user-supplied target. Relative targets are tried under each
    /// configured search directory, then the home directory.
    pub fn resolve(&self, target: &str) -> Resolution {
        let target = strip_quotes(target);
        let home = home_dir();
        let expanded = match (target.strip_prefix("~/"), &home) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(target),
        };

        let candidates: Vec<PathBuf> = if expanded.is_absolute() {
            vec![expanded]
        } else {
            self.search
                .folder_search_dirs
                .iter()
                .chain(home.iter())
                .map(|dir| dir.join(&expanded))
                .collect()
        };

        match candidates.iter().find(|candidate| candidate.exists()) {
            Some(found) => Resolution::Found(found.clone()),
            None => Resolution::Missing { tried: candidates },
        }
    }

    fn not_found(kind: &str, target: &str, tried: &[PathBuf]) -> AnswerEntry {
        let places = tried
            .iter()
            .map(|p| format!("  • {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n");
        AnswerEntry::new(
            EntryKind::IndexReport,
            format!("📁 {kind} indexing"),
            format!("❌ {kind} not found: \"{}\"\n\n🔍 Searched:\n{places}", strip_quotes(target)),
        )
    }

    async fn index_folder(&self, target: &str) -> AnswerEntry {
        let title = "📁 Folder indexing";
        let path = match self.resolve(target) {
            Resolution::Found(path) => path,
            Resolution::Missing { tried } => return Self::not_found("Folder", target, &tried),
        };

        let report = match self.indexer.index_tree(&path, true).await {
            Ok(summary) => {
                let root = summary.root.to_string_lossy().into_owned();
                let count = match self.stores.metadata.count_files_under(&root).await {
                    Ok(count) => count,
                    Err(e) => {
                        warn!("Failed to count files under {}: {:#}", root, e);
                        summary.indexed + summary.unchanged
                    }
                };
                info!("Folder request indexed {}", root);
                format!(
                    "✅ Folder indexed: {}\n📊 {} files indexed\n⏱️ Time: {:.2} seconds",
                    root,
                    count,
                    summary.elapsed.as_secs_f64()
                )
            }
            Err(IndexError::NotADirectory(path)) => format!("❌ Not a folder: {}", path.display()),
            Err(IndexError::UnsafeRoot(path)) => format!(
                "❌ Refusing to index {}: only folders inside your home project folders may be indexed.",
                path.display()
            ),
            Err(e) => format!("❌ Indexing failed: {e:#}"),
        };
        AnswerEntry::new(EntryKind::IndexReport, title, report)
    }

    async fn index_file(&self, target: &str) -> AnswerEntry {
        let title = "📄 File indexing";
        let path = match self.resolve(target) {
            Resolution::Found(path) => path,
            Resolution::Missing { tried } => return Self::not_found("File", target, &tried),
        };
        let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);

        let report = match self.indexer.index_file(&path).await {
            Ok(FileOutcome::Indexed { chunks, vectors }) => format!(
                "✅ File indexed: {}\n📊 {} chunks, {} vectors",
                path.display(),
                chunks,
                vectors
            ),
            Ok(FileOutcome::Unchanged) => format!("✅ Already up to date: {}", path.display()),
            Ok(FileOutcome::Skipped(reason)) => {
                format!("⚠️ Skipped {}: {}", path.display(), describe_skip(&reason))
            }
            Err(e) => format!("❌ Indexing failed: {e:#}"),
        };
        AnswerEntry::new(EntryKind::IndexReport, title, report)
    }

    async fn stats(&self) -> AnswerEntry {
        let stats = StoreStats::collect(&self.stores).await;
        let status = self.responder.status().await;
        AnswerEntry::new(
            EntryKind::Stats,
            "📊 Statistics",
            format!("{}\n\n{}", stats.render(), status.line()),
        )
    }

    async fn search(&self, query: &str) -> Vec<AnswerEntry> {
        let results = self.engine.search(query).await;
        let (sentinels, genuine): (Vec<SearchResult>, Vec<SearchResult>) =
            results.into_iter().partition(SearchResult::is_sentinel);

        let mode = if genuine.is_empty() {
            ResponseMode::GeneralKnowledge
        } else {
            self.intents.classify(query)
        };
        let answer = match self.responder.respond(mode, query, &genuine).await {
            Ok(text) => AnswerEntry::new(EntryKind::Answer, "🤖 Answer", text),
            Err(e) => {
                warn!("Responder failed: {}", e);
                AnswerEntry::new(EntryKind::Error, "❌ Answer failed", e.to_string())
            }
        };

        let mut entries = vec![answer];
        if genuine.is_empty() {
            entries.extend(sentinels.iter().map(|s| {
                AnswerEntry::new(EntryKind::Guidance, "🔍 No matching files", s.text.clone())
            }));
        } else {
            entries.extend(
                genuine
                    .iter()
                    .take(self.search.max_results)
                    .map(AnswerEntry::file_result),
            );
        }
        entries
    }
}

fn describe_skip(reason: &SkipReason) -> String {
    match reason {
        SkipReason::Ineligible => "outside the allowed folders or in an excluded directory".to_string(),
        SkipReason::NotText => "not a text file".to_string(),
        SkipReason::NotAFile => "not a regular file".to_string(),
        SkipReason::TooLarge { size } => format!("too large ({size} bytes)"),
        SkipReason::TooShort { chars } => format!("too little text ({chars} characters)"),
    }
}
