//! singleton-retriever: local file-tree indexing and hybrid search
//!
//! This crate owns both halves of the index. The write path walks safe
//! directories, chunks text files and stores records, chunks and embeddings.
//! The read path classifies queries and ranks files against what was stored.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: path safety rules, change detection, chunking, the
//!   [`Indexer`] and the filesystem [`Watcher`]
//! - **[`storage`]**: metadata and vector store traits with SQLite and
//!   offline implementations
//! - **[`query`]**: the [`QueryRouter`] and the cascading [`SearchEngine`]
//! - **[`stats`]**: [`StoreStats`] over both stores
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use singleton_embed::ResilientEmbedder;
//! use singleton_retriever::{Indexer, IndexerConfig, PathFilter, SearchEngine, Stores};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let stores = Stores::open(Path::new("/tmp/singleton-data")).await?;
//! let embedder = Arc::new(ResilientEmbedder::hash_only(768));
//! let indexer = Indexer::new(IndexerConfig::default(), PathFilter::default(), &stores, embedder.clone());
//! indexer.index_tree(Path::new("/home/me/Code/app"), true).await?;
//!
//! let engine = SearchEngine::new(&stores, embedder);
//! for result in engine.search("config").await {
//!     println!("{} ({})", result.path, result.relevance_score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Watcher ─→ Analyzer (Indexer) ─→ PathFilter → ChangeDetector → Chunking → Stores
//!                                                                  ↑          ↓
//!                                     QueryRouter → SearchEngine ──┴── StoreStats
//! ```

pub mod query;
pub mod retrieval;
pub mod stats;
pub mod storage;

pub use query::router::{QueryRouter, Route, RouterConfig};
pub use query::search_engine::{SearchEngine, SearchPhase, SearchResult, SimilarChunk};
pub use retrieval::analyzer::Analyzer;
pub use retrieval::directory_watcher::{DEFAULT_DEBOUNCE, Watcher};
pub use retrieval::indexing_engine::{
    FileOutcome, IndexError, Indexer, IndexerConfig, ProcessingStats, SkipReason, TreeSummary,
};
pub use retrieval::path_filter::{PathFilter, PathFilterConfig, home_dir};
pub use stats::StoreStats;
pub use storage::{SearchHistoryEntry, Stores};
