//! TOML configuration for the assistant
//!
//! Every section is optional. An empty file, or no file at all, gives the
//! defaults below.
//!
//! ```toml
//! data_dir = "/home/me/.singleton"
//!
//! [indexer]
//! max_workers = 8
//!
//! [embed]
//! backend = "hash"
//!
//! [responder]
//! enabled = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use singleton_embed::EmbedConfig;
use singleton_retriever::{IndexerConfig, PathFilterConfig, RouterConfig, home_dir};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name looked up inside the data directory.
pub const CONFIG_FILE: &str = "singleton.toml";

const FOLDER_SEARCH_SUBDIRS: &[&str] = &[
    "Desktop",
    "Documents",
    "Downloads",
    "Projects",
    "Code",
    "Development",
];

pub fn default_data_dir() -> PathBuf {
    home_dir()
        .map(|home| home.join(".singleton"))
        .unwrap_or_else(|| PathBuf::from(".singleton"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResponderConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub probe_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Files included in a prompt
    pub max_files: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub num_predict: u32,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3:8b".to_string(),
            probe_timeout_ms: 2000,
            request_timeout_ms: 30000,
            max_files: 3,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 50,
            num_predict: 2048,
        }
    }
}

impl ResponderConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatcherConfig {
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { debounce_ms: 2000 }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// File results shown after the answer
    pub max_results: usize,
    /// Directories tried, in order, for a relative folder or file target
    pub folder_search_dirs: Vec<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let folder_search_dirs = home_dir()
            .map(|home| FOLDER_SEARCH_SUBDIRS.iter().map(|sub| home.join(sub)).collect())
            .unwrap_or_default();
        Self {
            max_results: 10,
            folder_search_dirs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub filter: PathFilterConfig,
    pub indexer: IndexerConfig,
    pub embed: EmbedConfig,
    pub responder: ResponderConfig,
    pub router: RouterConfig,
    pub watcher: WatcherConfig,
    pub search: SearchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            filter: PathFilterConfig::default(),
            indexer: IndexerConfig::default(),
            embed: EmbedConfig::default(),
            responder: ResponderConfig::default(),
            router: RouterConfig::default(),
            watcher: WatcherConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration")
    }

    /// Load the configuration.
    ///
    /// An explicit `path` must exist. Without one, `<data_dir>/singleton.toml`
    /// is read when present, where `data_dir` is `data_dir_override` or the
    /// default. `data_dir_override` always wins over the file.
    pub fn load(path: Option<&Path>, data_dir_override: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let data_dir = data_dir_override
                    .map(Path::to_path_buf)
                    .unwrap_or_else(default_data_dir);
                let candidate = data_dir.join(CONFIG_FILE);
                if candidate.is_file() {
                    Self::read(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        if let Some(dir) = data_dir_override {
            config.data_dir = dir.to_path_buf();
        }
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use singleton_embed::EmbedBackend;

    #[test]
    fn test_empty_file_gives_defaults() -> Result<()> {
        let config = AppConfig::from_toml("")?;
        assert_eq!(config.indexer, IndexerConfig::default());
        assert_eq!(config.responder.model, "llama3:8b");
        assert_eq!(config.watcher.debounce(), Duration::from_secs(2));
        assert_eq!(config.search.max_results, 10);
        Ok(())
    }

    #[test]
    fn test_deserialize_partial_section() -> Result<()> {
        let config = AppConfig::from_toml(
            r#"
            data_dir = "/var/lib/singleton"

            [indexer]
            max_workers = 8

            [embed]
            backend = "hash"
            dimension = 64

            [router]
            stats_keywords = ["numbers"]
            "#,
        )?;
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/singleton"));
        assert_eq!(config.indexer.max_workers, 8);
        assert_eq!(config.indexer.max_chunk_size, 1000);
        assert_eq!(config.embed.backend, EmbedBackend::Hash);
        assert_eq!(config.embed.dimension, 64);
        assert_eq!(config.router.stats_keywords, vec!["numbers".to_string()]);
        assert_eq!(config.router.file_prefixes, RouterConfig::default().file_prefixes);
        Ok(())
    }

    #[test]
    fn test_unknown_value_is_an_error() {
        assert!(AppConfig::from_toml("[embed]\nbackend = \"cloud\"").is_err());
    }

    #[test]
    fn test_load_lookup_order() -> Result<()> {
        let dir = tempfile::tempdir()?;

        let config = AppConfig::load(None, Some(dir.path()))?;
        assert_eq!(config.data_dir, dir.path());
        assert!(config.responder.enabled);

        std::fs::write(dir.path().join(CONFIG_FILE), "[responder]\nenabled = false\n")?;
        let config = AppConfig::load(None, Some(dir.path()))?;
        assert!(!config.responder.enabled);
        assert_eq!(config.data_dir, dir.path());

        let explicit = dir.path().join("other.toml");
        std::fs::write(&explicit, "data_dir = \"/elsewhere\"\n[search]\nmax_results = 3\n")?;
        let config = AppConfig::load(Some(&explicit), None)?;
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.data_dir, PathBuf::from("/elsewhere"));

        assert!(AppConfig::load(Some(&dir.path().join("missing.toml")), None).is_err());
        Ok(())
    }
}
