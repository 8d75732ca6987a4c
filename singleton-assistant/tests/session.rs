//! A whole session through `Assistant::open` with on-disk stores

use anyhow::Result;
use singleton_assistant::{AppConfig, Assistant, EntryKind};
use singleton_embed::EmbedBackend;
use singleton_retriever::{PathFilterConfig, StoreStats};
use std::path::PathBuf;
use tempfile::TempDir;

struct Session {
    _data: TempDir,
    workspace: TempDir,
    root: PathBuf,
    config: AppConfig,
}

fn session() -> Result<Session> {
    let data = tempfile::tempdir()?;
    let workspace = tempfile::tempdir()?;
    let root = workspace.path().canonicalize()?;

    let mut config = AppConfig::default();
    config.data_dir = data.path().to_path_buf();
    config.embed.backend = EmbedBackend::Hash;
    config.embed.dimension = 32;
    config.responder.enabled = false;
    config.filter = PathFilterConfig::with_safe_roots([root.clone()]);
    config.search.folder_search_dirs = vec![root.clone()];

    Ok(Session {
        _data: data,
        workspace,
        root,
        config,
    })
}

#[tokio::test]
async fn test_index_search_and_reopen() -> Result<()> {
    let s = session()?;
    let project = s.root.join("shop");
    tokio::fs::create_dir_all(project.join("src")).await?;
    tokio::fs::write(
        project.join("src/cart.ts"),
        "export function addToCart(item: Item) { cart.push(item); }",
    )
    .await?;
    tokio::fs::write(project.join("README.md"), "The shop sells things. The cart holds them.").await?;

    {
        let assistant = Assistant::open(s.config.clone()).await?;
        let report = assistant.orchestrator.answer("project: shop").await;
        assert_eq!(report[0].kind, EntryKind::IndexReport);
        assert!(report[0].text.contains("2 files indexed"));

        let entries = assistant.orchestrator.answer("cart").await;
        assert_eq!(entries[0].kind, EntryKind::Answer);
        assert!(entries[0].text.contains("Responder offline"));
        let first = &entries[1];
        assert_eq!(first.kind, EntryKind::FileResult);
        assert!(first.path.as_deref().is_some_and(|p| p.ends_with("cart.ts")));
    }

    // The data directory now holds both databases and survives a reopen.
    assert!(s.config.data_dir.join("singleton.db").exists());
    assert!(s.config.data_dir.join("vectors.db").exists());
    let assistant = Assistant::open(s.config.clone()).await?;
    let stats = StoreStats::collect(&assistant.stores).await;
    assert_eq!(stats.total_files, 2);
    assert!(stats.total_vectors >= 2);
    assert_eq!(stats.indexed_types, vec!["code".to_string(), "documentation".to_string()]);

    let history = assistant.engine.recent_searches(10).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, "cart");
    Ok(())
}

#[tokio::test]
async fn test_stats_on_empty_store() -> Result<()> {
    let s = session()?;
    let assistant = Assistant::open(s.config.clone()).await?;

    let entries = assistant.orchestrator.answer("istatistik").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::Stats);
    assert!(entries[0].text.contains("Files: 0"));
    assert!(entries[0].text.contains("Responder: offline"));
    Ok(())
}

#[tokio::test]
async fn test_watcher_picks_up_new_file() -> Result<()> {
    let mut s = session()?;
    s.config.watcher.debounce_ms = 100;
    let assistant = Assistant::open(s.config.clone()).await?;
    let mut watcher = assistant.watcher();
    watcher.start(s.workspace.path()).await?;

    let path = s.root.join("fresh.md");
    tokio::fs::write(&path, "A file written while the watcher runs.").await?;

    let key = path.to_string_lossy().into_owned();
    let mut found = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if assistant.stores.metadata.get_file(&key).await?.is_some() {
            found = true;
            break;
        }
    }
    watcher.stop().await;
    assert!(found, "watcher did not index {key}");
    Ok(())
}
