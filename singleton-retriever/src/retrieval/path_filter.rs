//! Decides which paths may be traversed or indexed
//!
//! Every check here is lexical. Paths are normalized (`.`/`..` resolved,
//! separators turned into `/`, letters lowercased) and compared as strings;
//! the filesystem is never consulted.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_DEPTH: usize = 10;

const SKIP_DIR_NAMES: &[&str] = &[
    "node_modules",
    "bower_components",
    "vendor",
    "packages",
    ".npm",
    ".yarn",
    ".pnpm",
    "npm-cache",
    "yarn-cache",
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    "build",
    "dist",
    "out",
    "target",
    "bin",
    "obj",
    "debug",
    "release",
    ".next",
    ".nuxt",
    ".gatsby",
    ".vs",
    ".idea",
    ".eclipse",
    ".sublime",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".env",
    ".gradle",
    ".maven",
    "cache",
    ".cache",
    "logs",
    ".logs",
    "tmp",
    "temp",
    ".tmp",
    ".temp",
    "temporary internet files",
    "backup",
    "backups",
    ".backup",
    ".bak",
];

const ALLOWED_HIDDEN_DIRS: &[&str] = &[".vscode", ".github"];

const SYSTEM_NAMES: &[&str] = &[
    "windows",
    "system32",
    "syswow64",
    "drivers",
    "driver",
    "program files",
    "program files (x86)",
    "programdata",
    "$recycle.bin",
    ".trash",
    ".trashes",
    "pagefile.sys",
    "hiberfil.sys",
    "swapfile.sys",
    "system volume information",
    "windows.old",
    "recovery",
    "msocache",
    ".ds_store",
    "thumbs.db",
    "desktop.ini",
];

const SYSTEM_PREFIXES: &[&str] = &[
    "c:/windows",
    "c:/program files",
    "c:/program files (x86)",
    "c:/programdata",
    "/system",
    "/library",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
    "/proc",
    "/sys",
    "/dev",
    "/boot",
];

const SAFE_HOME_SUBDIRS: &[&str] = &[
    "Desktop",
    "Documents",
    "Downloads",
    "Projects",
    "Code",
    "Development",
    "Workspace",
];

/// The user's home directory from `HOME`, or `USERPROFILE` on Windows.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathFilterConfig {
    /// Directory basenames never descended into.
    pub skip_dir_names: Vec<String>,
    /// Hidden directories that are still traversed.
    pub allowed_hidden_dirs: Vec<String>,
    /// Path prefixes of operating-system and program directories.
    pub system_prefixes: Vec<String>,
    /// Basenames of system directories and files.
    pub system_names: Vec<String>,
    /// The only directories that may be indexed, together with everything below them.
    pub safe_roots: Vec<PathBuf>,
    pub max_depth: usize,
}

impl Default for PathFilterConfig {
    fn default() -> Self {
        let safe_roots = home_dir()
            .map(|home| SAFE_HOME_SUBDIRS.iter().map(|sub| home.join(sub)).collect())
            .unwrap_or_default();
        Self {
            skip_dir_names: owned(SKIP_DIR_NAMES),
            allowed_hidden_dirs: owned(ALLOWED_HIDDEN_DIRS),
            system_prefixes: owned(SYSTEM_PREFIXES),
            system_names: owned(SYSTEM_NAMES),
            safe_roots,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl PathFilterConfig {
    /// Defaults with `roots` as the only safe roots.
    pub fn with_safe_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            safe_roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Lexically normalize a path for comparison.
pub fn normalize(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let absolute = raw.starts_with('/');
    let mut parts: Vec<String> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other.to_lowercase()),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// The components of `path` strictly below `root`, or `None` when `path` is
/// not `root` or a descendant of it. Both must already be normalized.
fn relative_components<'a>(path: &'a str, root: &str) -> Option<Vec<&'a str>> {
    let root = root.trim_end_matches('/');
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    let rest = rest.strip_prefix('/')?;
    Some(rest.split('/').filter(|part| !part.is_empty()).collect())
}

#[derive(Debug, Clone)]
pub struct PathFilter {
    config: PathFilterConfig,
    skip_names: HashSet<String>,
    allowed_hidden: HashSet<String>,
    system_names: HashSet<String>,
    system_prefixes: Vec<String>,
    safe_roots: Vec<String>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new(PathFilterConfig::default())
    }
}

impl PathFilter {
    pub fn new(config: PathFilterConfig) -> Self {
        let lower_set = |names: &[String]| names.iter().map(|n| n.to_lowercase()).collect();
        Self {
            skip_names: lower_set(&config.skip_dir_names),
            allowed_hidden: lower_set(&config.allowed_hidden_dirs),
            system_names: lower_set(&config.system_names),
            system_prefixes: config
                .system_prefixes
                .iter()
                .map(|prefix| normalize(Path::new(prefix)))
                .collect(),
            safe_roots: config.safe_roots.iter().map(|root| normalize(root)).collect(),
            config,
        }
    }

    pub fn config(&self) -> &PathFilterConfig {
        &self.config
    }

    fn is_system_path(&self, normalized: &str) -> bool {
        self.system_prefixes
            .iter()
            .any(|prefix| relative_components(normalized, prefix).is_some())
    }

    /// Components below the deepest safe root containing `normalized`.
    fn below_safe_root<'a>(&self, normalized: &'a str) -> Option<Vec<&'a str>> {
        self.safe_roots
            .iter()
            .filter_map(|root| relative_components(normalized, root))
            .min_by_key(|rest| rest.len())
    }

    /// True when `path` is a safe root or lies under one, and is not a system path.
    pub fn is_safe_root(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        !self.is_system_path(&normalized) && self.below_safe_root(&normalized).is_some()
    }

    /// True when the directory basename `name` must not be descended into.
    pub fn should_skip_directory(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.skip_names.contains(&name) || self.system_names.contains(&name) {
            return true;
        }
        name.starts_with('.') && !self.allowed_hidden.contains(&name)
    }

    /// `depth` counts directories below the walk root; the root itself is 0.
    pub fn within_depth(&self, depth: usize) -> bool {
        depth <= self.config.max_depth
    }

    /// True when the file at `path` may be indexed.
    pub fn is_eligible(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        if self.is_system_path(&normalized) {
            return false;
        }
        let Some(components) = self.below_safe_root(&normalized) else {
            return false;
        };
        let Some((file_name, dirs)) = components.split_last() else {
            // The safe root itself is a directory, never a file to index.
            return false;
        };
        if self.system_names.contains(*file_name) {
            return false;
        }
        self.within_depth(dirs.len()) && !dirs.iter().any(|dir| self.should_skip_directory(dir))
    }

    /// Case-insensitive ignore set rooted at `root`, built from the same name
    /// lists, so watchers can drop events before they reach the indexer.
    pub fn ignore_matcher(&self, root: &Path) -> Result<Gitignore, ignore::Error> {
        let mut builder = GitignoreBuilder::new(root);
        builder.case_insensitive(true)?;
        for name in &self.config.skip_dir_names {
            builder.add_line(None, &format!("{name}/"))?;
        }
        for name in &self.config.system_names {
            builder.add_line(None, name)?;
        }
        builder.add_line(None, ".*/")?;
        for name in &self.config.allowed_hidden_dirs {
            builder.add_line(None, &format!("!{name}/"))?;
        }
        builder.build()
    }
}
