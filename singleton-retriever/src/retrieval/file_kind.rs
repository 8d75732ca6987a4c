//! Static file classification by extension and basename

use serde::Serialize;
use std::path::Path;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "mdown", "mkd", "js", "ts", "jsx", "tsx", "json", "jsonl", "ndjson",
    "css", "html", "py", "java", "cpp", "c", "h", "hpp", "cs", "php", "rb", "go", "rs", "sh", "bat",
    "cmd", "sql", "xml", "yaml", "yml", "toml", "ini", "cfg", "conf", "log", "csv", "tsv", "psv",
    "ssv", "rst", "tex", "lua", "pl", "r", "m", "scala", "swift", "kt", "textile", "rdoc", "org",
    "creole", "mediawiki", "wiki", "adoc", "asciidoc", "env",
];

const TEXT_DOTFILES: &[&str] = &[
    ".gitignore",
    ".dockerignore",
    ".eslintrc",
    ".prettierrc",
    ".babelrc",
    ".npmrc",
    ".yarnrc",
    ".editorconfig",
];

const TEXT_BASENAMES: &[&str] = &[
    "dockerfile",
    "makefile",
    "rakefile",
    "gemfile",
    "vagrantfile",
    "readme",
    "license",
    "changelog",
    "todo",
    "fixme",
    "authors",
    "contributors",
];

/// `{file_type, language}` pair stored with every record and chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileKind {
    pub file_type: String,
    pub language: String,
}

impl FileKind {
    fn new(file_type: &str, language: &str) -> Self {
        Self {
            file_type: file_type.to_string(),
            language: language.to_string(),
        }
    }

    pub fn unknown() -> Self {
        Self::new("unknown", "unknown")
    }
}

fn lower_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

fn lower_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// True for files whose content is worth reading as text.
pub fn is_text_file(path: &Path) -> bool {
    let Some(name) = lower_name(path) else {
        return false;
    };
    if TEXT_DOTFILES.contains(&name.as_str()) || TEXT_BASENAMES.contains(&name.as_str()) {
        return true;
    }
    lower_extension(path).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
}

pub fn classify(path: &Path) -> FileKind {
    match lower_name(path).as_deref() {
        Some("dockerfile") => return FileKind::new("config", "docker"),
        Some("makefile") => return FileKind::new("build", "makefile"),
        Some("readme") | Some("readme.md") => return FileKind::new("documentation", "markdown"),
        _ => {}
    }

    let Some(ext) = lower_extension(path) else {
        return FileKind::unknown();
    };
    match ext.as_str() {
        "js" => FileKind::new("code", "javascript"),
        "ts" => FileKind::new("code", "typescript"),
        "jsx" => FileKind::new("code", "react"),
        "tsx" => FileKind::new("code", "react-typescript"),
        "py" => FileKind::new("code", "python"),
        "java" => FileKind::new("code", "java"),
        "cpp" => FileKind::new("code", "cpp"),
        "c" => FileKind::new("code", "c"),
        "cs" => FileKind::new("code", "csharp"),
        "php" => FileKind::new("code", "php"),
        "rb" => FileKind::new("code", "ruby"),
        "go" => FileKind::new("code", "go"),
        "rs" => FileKind::new("code", "rust"),
        "json" => FileKind::new("data", "json"),
        "xml" => FileKind::new("data", "xml"),
        "yaml" | "yml" => FileKind::new("config", "yaml"),
        "toml" => FileKind::new("config", "toml"),
        "md" => FileKind::new("documentation", "markdown"),
        "txt" => FileKind::new("text", "plain"),
        "html" => FileKind::new("markup", "html"),
        "css" => FileKind::new("style", "css"),
        "sql" => FileKind::new("database", "sql"),
        _ => FileKind::unknown(),
    }
}
