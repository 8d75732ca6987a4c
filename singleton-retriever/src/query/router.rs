//! Classifies a raw query into a command or a search
//!
//! The rules form an ordered list evaluated first-match-wins:
//! help, stats, folder indexing, file indexing. Anything left is a search.
//! The order matters: "show stats for search" must be a stats request.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    pub help_keywords: Vec<String>,
    pub stats_keywords: Vec<String>,
    pub folder_prefixes: Vec<String>,
    pub file_prefixes: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            help_keywords: owned(&["help", "yardım", "yardim"]),
            stats_keywords: owned(&["stats", "statistics", "istatistik", "istatistikler"]),
            folder_prefixes: owned(&["folder", "klasör", "klasor", "index", "project", "proje"]),
            file_prefixes: owned(&["file", "dosya"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    Help,
    Stats,
    IndexFolder { target: String },
    IndexFile { target: String },
    Search { query: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Help,
    Stats,
    IndexFolder,
    IndexFile,
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub kind: RouteKind,
    pub pattern: Regex,
}

impl RouteRule {
    fn apply(&self, query: &str) -> Option<Route> {
        match self.kind {
            RouteKind::Help => self.pattern.is_match(query).then_some(Route::Help),
            RouteKind::Stats => self.pattern.is_match(query).then_some(Route::Stats),
            RouteKind::IndexFolder => {
                capture_target(&self.pattern, query).map(|target| Route::IndexFolder { target })
            }
            RouteKind::IndexFile => {
                capture_target(&self.pattern, query).map(|target| Route::IndexFile { target })
            }
        }
    }
}

fn capture_target(pattern: &Regex, query: &str) -> Option<String> {
    let raw = pattern.captures(query)?.get(1)?.as_str();
    let target = strip_quotes(raw.trim());
    (!target.is_empty()).then(|| target.to_string())
}

/// Remove matching surrounding quotes, repeatedly.
pub fn strip_quotes(text: &str) -> &str {
    let mut text = text.trim();
    loop {
        let stripped = ['"', '\'']
            .iter()
            .find_map(|q| text.strip_prefix(*q).and_then(|t| t.strip_suffix(*q)));
        match stripped {
            Some(inner) => text = inner.trim(),
            None => return text,
        }
    }
}

fn alternation(words: &[String]) -> String {
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

fn keyword_rule(
    kind: RouteKind,
    words: &[String],
    extra: Option<&str>,
) -> Result<Option<RouteRule>, regex::Error> {
    let mut branches: Vec<String> = extra.map(str::to_string).into_iter().collect();
    if !words.is_empty() {
        branches.push(format!(r"\b(?:{})\b", alternation(words)));
    }
    if branches.is_empty() {
        return Ok(None);
    }
    let pattern = Regex::new(&format!("(?i){}", branches.join("|")))?;
    Ok(Some(RouteRule { kind, pattern }))
}

fn prefix_rule(kind: RouteKind, prefixes: &[String]) -> Result<Option<RouteRule>, regex::Error> {
    if prefixes.is_empty() {
        return Ok(None);
    }
    let pattern = Regex::new(&format!(
        r"(?is)^\s*(?:{})\s*:\s*(.*?)\s*$",
        alternation(prefixes)
    ))?;
    Ok(Some(RouteRule { kind, pattern }))
}

#[derive(Debug, Clone)]
pub struct QueryRouter {
    rules: Vec<RouteRule>,
}

impl QueryRouter {
    pub fn new(config: &RouterConfig) -> Result<Self, regex::Error> {
        // A rule with no words is left out; the order of the rest is unchanged.
        let rules = [
            keyword_rule(RouteKind::Help, &config.help_keywords, Some(r"^\s*\?\s*$"))?,
            keyword_rule(RouteKind::Stats, &config.stats_keywords, None)?,
            prefix_rule(RouteKind::IndexFolder, &config.folder_prefixes)?,
            prefix_rule(RouteKind::IndexFile, &config.file_prefixes)?,
        ];
        Ok(Self {
            rules: rules.into_iter().flatten().collect(),
        })
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn classify(&self, query: &str) -> Route {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(query))
            .unwrap_or_else(|| Route::Search {
                query: query.to_string(),
            })
    }
}
