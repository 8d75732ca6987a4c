use super::analyzer::Analyzer;
use super::indexing_engine::IndexError;
use super::path_filter::PathFilter;
use anyhow::{Context, Result};
use futures::StreamExt;
use ignore::gitignore::Gitignore;
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

struct ActiveWatch {
    root: PathBuf,
    debouncer: Debouncer<notify::RecommendedWatcher>,
    shutdown: oneshot::Sender<()>,
    listener: tokio::task::JoinHandle<()>,
}

/// Watches one root at a time and feeds changes to an [`Analyzer`].
pub struct Watcher<A: Analyzer + 'static> {
    analyzer: Arc<A>,
    filter: PathFilter,
    debounce: Duration,
    active: Option<ActiveWatch>,
}

impl<A: Analyzer + 'static> Watcher<A> {
    pub fn new(analyzer: Arc<A>, filter: PathFilter, debounce: Duration) -> Self {
        Self {
            analyzer,
            filter,
            debounce,
            active: None,
        }
    }

    pub fn watched_root(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.root.as_path())
    }

    /// Start watching `root`, stopping any watch already running.
    pub async fn start(&mut self, root: &Path) -> Result<()> {
        self.stop().await;

        let root = tokio::fs::canonicalize(root)
            .await
            .with_context(|| format!("Cannot watch {}", root.display()))?;
        if !self.filter.is_safe_root(&root) {
            return Err(IndexError::UnsafeRoot(root).into());
        }
        let matcher = self
            .filter
            .ignore_matcher(&root)
            .with_context(|| format!("Failed to build ignore rules for {}", root.display()))?;

        let (events_tx, events_rx) = mpsc::channel(128);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        // The listener needs to exist first or the callback may block
        let listener = tokio::spawn(Self::listen(events_rx, shutdown_rx, self.analyzer.clone()));

        let filter = self.filter.clone();
        let event_root = root.clone();
        let mut debouncer = new_debouncer(self.debounce, move |res: DebounceEventResult| {
            let events = match res {
                Ok(events) => events,
                Err(e) => {
                    warn!("Watch error under {}: {}", event_root.display(), e);
                    return;
                }
            };
            for ev in events {
                if !should_forward(&matcher, &filter, &event_root, &ev.path) {
                    continue;
                }
                // Runs on the notify thread, not inside the runtime.
                if events_tx.blocking_send(ev.path).is_err() {
                    return;
                }
            }
        })?;

        debouncer
            .watcher()
            .watch(&root, notify::RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        info!("Watching {}", root.display());
        self.active = Some(ActiveWatch {
            root,
            debouncer,
            shutdown: shutdown_tx,
            listener,
        });
        Ok(())
    }

    /// Stop the active watch, waiting for in-flight analysis to finish.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        drop(active.debouncer);
        let _ = active.shutdown.send(());
        if let Err(e) = active.listener.await {
            warn!("Watcher listener for {} ended abnormally: {}", active.root.display(), e);
        }
        info!("Stopped watching {}", active.root.display());
    }

    async fn listen(
        events_rx: mpsc::Receiver<PathBuf>,
        shutdown: oneshot::Receiver<()>,
        analyzer: Arc<A>,
    ) {
        let analyzer_ref = analyzer.as_ref();
        tokio_stream::wrappers::ReceiverStream::new(events_rx)
            .take_until(shutdown)
            .for_each_concurrent(16, |path| async move { dispatch(analyzer_ref, path).await })
            .await;
    }
}

fn should_forward(matcher: &Gitignore, filter: &PathFilter, root: &Path, path: &Path) -> bool {
    // The matcher panics on paths outside its root.
    if !path.starts_with(root) {
        return false;
    }
    if matcher
        .matched_path_or_any_parents(path, path.is_dir())
        .is_ignore()
    {
        return false;
    }
    filter.is_eligible(path)
}

/// Route one event: existing files are analyzed, vanished paths forgotten.
async fn dispatch<A: Analyzer + ?Sized>(analyzer: &A, path: PathBuf) {
    let result = match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => analyzer.analyze(&path).await,
        Ok(_) => {
            debug!("Ignoring directory event for {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => analyzer.forget(&path).await,
        Err(e) => {
            warn!("Cannot stat {}: {}", path.display(), e);
            Ok(())
        }
    };
    if let Err(err) = result {
        error!("Failed to analyze path {}: {:#}", path.display(), err);
    }
}
