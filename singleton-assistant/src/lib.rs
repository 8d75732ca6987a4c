//! # singleton-assistant
//!
//! Answers questions about local files. A query is routed to a command
//! (help, stats, folder or file indexing) or searched over the index, and
//! search results are turned into an answer by a local Ollama model when one
//! is running.
//!
//! ## Architecture
//!
//! ```text
//! query → Orchestrator → QueryRouter ─┬→ Indexer (folder:/file:)
//!                                     ├→ StoreStats (stats)
//!                                     └→ SearchEngine → IntentClassifier → Responder
//! ```
//!
//! The pieces come from sibling crates:
//! - `singleton-retriever` for stores, indexing, watching and search
//! - `singleton-embed` for embeddings
//! - `singleton-context` for chunking, through the retriever
//!
//! ## Quick Start
//!
//! ```no_run
//! use singleton_assistant::{AppConfig, Assistant};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let assistant = Assistant::open(AppConfig::load(None, None)?).await?;
//! for entry in assistant.orchestrator.answer("folder: my-project").await {
//!     println!("{}\n{}", entry.title, entry.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod intent;
pub mod orchestrator;
pub mod responder;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::AppConfig;
pub use orchestrator::{AnswerEntry, EntryKind, Orchestrator};
pub use responder::{OfflineResponder, OllamaResponder, Responder, ResponderError, ResponseMode};

use anyhow::{Context, Result};
use singleton_embed::ResilientEmbedder;
use singleton_retriever::{Indexer, PathFilter, QueryRouter, SearchEngine, Stores, Watcher};
use std::sync::Arc;
use tracing::info;

/// Everything a session needs, opened from one [`AppConfig`].
pub struct Assistant {
    pub config: AppConfig,
    pub stores: Stores,
    pub indexer: Arc<Indexer>,
    pub engine: SearchEngine,
    pub orchestrator: Orchestrator,
}

impl Assistant {
    pub async fn open(config: AppConfig) -> Result<Self> {
        let stores = Stores::open(&config.data_dir).await?;
        let embedder = Arc::new(
            ResilientEmbedder::connect(&config.embed)
                .await
                .context("Failed to configure embeddings")?,
        );

        let indexer = Arc::new(Indexer::new(
            config.indexer.clone(),
            PathFilter::new(config.filter.clone()),
            &stores,
            embedder.clone(),
        ));
        let engine = SearchEngine::new(&stores, embedder);

        let responder: Arc<dyn Responder> = if config.responder.enabled {
            Arc::new(OllamaResponder::new(config.responder.clone())?)
        } else {
            info!("Responder disabled, answering offline");
            Arc::new(OfflineResponder::new(config.responder.model.clone()))
        };
        let router = QueryRouter::new(&config.router).context("Invalid router keywords")?;

        let orchestrator = Orchestrator::new(
            router,
            indexer.clone(),
            engine.clone(),
            stores.clone(),
            responder,
            config.search.clone(),
        )?;

        Ok(Self {
            config,
            stores,
            indexer,
            engine,
            orchestrator,
        })
    }

    /// A watcher that feeds this session's indexer.
    pub fn watcher(&self) -> Watcher<Indexer> {
        Watcher::new(
            self.indexer.clone(),
            PathFilter::new(self.config.filter.clone()),
            self.config.watcher.debounce(),
        )
    }
}
