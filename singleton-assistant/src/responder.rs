//! Natural-language answers over search results
//!
//! [`OllamaResponder`] asks a local Ollama server through `/api/generate`
//! and keeps the conversation context it returns between calls. When the
//! server does not answer its probe, the deterministic [`OfflineResponder`]
//! answers instead.

use crate::config::ResponderConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use singleton_retriever::SearchResult;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const EXCERPT_CHARS: usize = 1500;

#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    #[error("[responder] backend unreachable at {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("[responder] request timed out after {0:?}")]
    Timeout(Duration),
    #[error("[responder] backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("[responder] could not decode response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    CodeAnalysis,
    FeatureSuggestion,
    Debugging,
    ArchitectureSummary,
    GeneralKnowledge,
}

impl ResponseMode {
    fn task(self) -> &'static str {
        match self {
            Self::CodeAnalysis => {
                "Analyse these files and answer the question. Explain what the code does, \
                 the technologies it uses and concrete improvements with code."
            }
            Self::FeatureSuggestion => {
                "Plan how to implement the requested feature in this project. \
                 Name the files to change and give complete code examples."
            }
            Self::Debugging => {
                "Find the cause of the described problem in these files and give a \
                 complete fix, plus how to keep it from happening again."
            }
            Self::ArchitectureSummary => {
                "Summarise the architecture of this project: its main components, \
                 how they connect, and the data flow between them."
            }
            Self::GeneralKnowledge => {
                "No project files matched. Answer the question from general knowledge."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponderStatus {
    pub running: bool,
    pub model: String,
    pub available_models: Vec<String>,
    /// Tokens of conversation context carried to the next call
    pub history_length: usize,
}

impl ResponderStatus {
    pub fn line(&self) -> String {
        if self.running {
            format!(
                "🤖 Responder: running ({}), {} context tokens",
                self.model, self.history_length
            )
        } else {
            format!("🤖 Responder: offline ({})", self.model)
        }
    }
}

#[async_trait]
pub trait Responder: Send + Sync {
    /// Liveness probe of the backend.
    async fn is_available(&self) -> bool;

    async fn respond(
        &self,
        mode: ResponseMode,
        query: &str,
        files: &[SearchResult],
    ) -> Result<String, ResponderError>;

    async fn status(&self) -> ResponderStatus;

    /// Forget the conversation context.
    async fn reset(&self);
}

/// Fixed answers that need no backend.
#[derive(Debug, Clone)]
pub struct OfflineResponder {
    model: String,
}

impl OfflineResponder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    fn bullet_list(files: &[SearchResult], limit: usize) -> String {
        files
            .iter()
            .take(limit)
            .map(|f| format!("• {}", f.file_name()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn how_to_start(&self) -> String {
        format!(
            "🚀 To enable answers:\n1. Start the server with `ollama serve`.\n\
             2. Make sure the model is installed with `ollama pull {}`.\n3. Ask again.",
            self.model
        )
    }

    pub fn render(&self, mode: ResponseMode, query: &str, files: &[SearchResult]) -> String {
        let header = "🤖 Responder offline\n---\n❌ The Ollama server is not running or not answering.";
        let body = match mode {
            ResponseMode::CodeAnalysis => {
                let listed = files
                    .iter()
                    .take(3)
                    .map(|f| format!("📄 {} ({})", f.file_name(), f.file_type))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "📊 Files found: {}\n{}\n\n🔍 Your query: \"{}\"",
                    files.len(),
                    listed,
                    query
                )
            }
            ResponseMode::FeatureSuggestion => format!(
                "🎯 Requested feature: \"{}\"\n\n📋 Files that may be relevant:\n{}\n\n\
                 💡 Approach:\n1. Read the files above and follow their structure.\n\
                 2. Decide which functions the feature needs.\n\
                 3. Write the new code in the existing style.\n\
                 4. Wire it in through the existing imports and exports.",
                query,
                Self::bullet_list(files, 5)
            ),
            ResponseMode::Debugging => format!(
                "🔍 Problem: \"{}\"\n\n📄 Related files:\n{}\n\n🔧 Checklist:\n\
                 - Are all values initialised before use?\n\
                 - Are import paths spelled correctly?\n\
                 - Is every async call awaited?\n\
                 - Do the types on both sides of each call agree?",
                query,
                Self::bullet_list(files, 3)
            ),
            ResponseMode::ArchitectureSummary => {
                let mut types: Vec<&str> = files
                    .iter()
                    .map(|f| f.file_type.as_str())
                    .filter(|t| !t.is_empty())
                    .collect();
                types.sort_unstable();
                types.dedup();
                format!(
                    "📊 Project overview:\n• Files: {}\n• File types: {}\n\n📂 Files:\n{}",
                    files.len(),
                    if types.is_empty() { "unknown".to_string() } else { types.join(", ") },
                    Self::bullet_list(files, 8)
                )
            }
            ResponseMode::GeneralKnowledge => format!(
                "🔍 Your query: \"{query}\"\n\nNo indexed files matched, and general answers \
                 need the responder."
            ),
        };
        format!("{header}\n\n{body}\n\n{}", self.how_to_start())
    }
}

#[async_trait]
impl Responder for OfflineResponder {
    async fn is_available(&self) -> bool {
        false
    }

    async fn respond(
        &self,
        mode: ResponseMode,
        query: &str,
        files: &[SearchResult],
    ) -> Result<String, ResponderError> {
        Ok(self.render(mode, query, files))
    }

    async fn status(&self) -> ResponderStatus {
        ResponderStatus {
            running: false,
            model: self.model.clone(),
            available_models: Vec::new(),
            history_length: 0,
        }
    }

    async fn reset(&self) {}
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    num_predict: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    context: &'a [i64],
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    context: Option<Vec<i64>>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

fn excerpt(file: &SearchResult) -> String {
    let mut text: String = file.text.chars().take(EXCERPT_CHARS).collect();
    if file.text.chars().count() > EXCERPT_CHARS {
        text.push_str("\n[...truncated...]");
    }
    format!(
        "---\n📄 FILE: {} ({}/{})\nCONTENT:\n{}",
        file.file_name(),
        file.file_type,
        file.language,
        text
    )
}

/// The prompt for `mode`, with at most `max_files` excerpts.
pub fn build_prompt(mode: ResponseMode, query: &str, files: &[SearchResult], max_files: usize) -> String {
    let mut prompt = format!("You are a senior software engineer.\n\nQUESTION: \"{query}\"\n\n");
    if !files.is_empty() && mode != ResponseMode::GeneralKnowledge {
        let excerpts: Vec<String> = files.iter().take(max_files).map(excerpt).collect();
        prompt.push_str("PROJECT FILES:\n");
        prompt.push_str(&excerpts.join("\n\n"));
        prompt.push_str("\n\n");
    }
    prompt.push_str("TASK: ");
    prompt.push_str(mode.task());
    prompt
}

/// Trim the answer and collapse runs of blank lines to one.
fn tidy(response: &str) -> String {
    let mut out = Vec::new();
    let mut blank = false;
    for line in response.trim().lines() {
        let is_blank = line.trim().is_empty();
        if is_blank && blank {
            continue;
        }
        blank = is_blank;
        out.push(line);
    }
    out.join("\n")
}

pub struct OllamaResponder {
    client: reqwest::Client,
    config: ResponderConfig,
    context: Mutex<Vec<i64>>,
    offline: OfflineResponder,
}

impl OllamaResponder {
    pub fn new(config: ResponderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        info!("Responder using {} at {}", config.model, config.endpoint);
        Ok(Self {
            client,
            offline: OfflineResponder::new(config.model.clone()),
            config,
            context: Mutex::new(Vec::new()),
        })
    }

    async fn tags(&self) -> Option<TagsResponse> {
        let response = self
            .client
            .get(self.config.url("api/tags"))
            .timeout(self.config.probe_timeout())
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => {
                response.json::<TagsResponse>().await.ok().or(Some(TagsResponse { models: Vec::new() }))
            }
            Ok(response) => {
                debug!("Responder probe returned HTTP {}", response.status());
                None
            }
            Err(e) => {
                debug!("Responder probe at {} failed: {}", self.config.endpoint, e);
                None
            }
        }
    }

    fn transport_error(&self, source: reqwest::Error) -> ResponderError {
        if source.is_timeout() {
            ResponderError::Timeout(self.config.request_timeout())
        } else {
            ResponderError::Unreachable {
                endpoint: self.config.endpoint.clone(),
                source,
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, ResponderError> {
        let mut context = self.context.lock().await;
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            context: context.as_slice(),
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                num_predict: self.config.num_predict,
            },
        };

        let response = self
            .client
            .post(self.config.url("api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResponderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| ResponderError::Decode(e.to_string()))?;
        if let Some(next) = parsed.context {
            *context = next;
        }
        Ok(tidy(&parsed.response))
    }
}

#[async_trait]
impl Responder for OllamaResponder {
    async fn is_available(&self) -> bool {
        self.tags().await.is_some()
    }

    async fn respond(
        &self,
        mode: ResponseMode,
        query: &str,
        files: &[SearchResult],
    ) -> Result<String, ResponderError> {
        if !self.is_available().await {
            warn!("Responder unreachable at {}, answering offline", self.config.endpoint);
            return self.offline.respond(mode, query, files).await;
        }
        let prompt = build_prompt(mode, query, files, self.config.max_files);
        let answer = self.generate(&prompt).await?;
        if answer.is_empty() {
            return Ok("No answer was returned.".to_string());
        }
        Ok(answer)
    }

    async fn status(&self) -> ResponderStatus {
        let tags = self.tags().await;
        ResponderStatus {
            running: tags.is_some(),
            model: self.config.model.clone(),
            available_models: tags
                .map(|t| t.models.into_iter().map(|m| m.name).collect())
                .unwrap_or_default(),
            history_length: self.context.lock().await.len(),
        }
    }

    async fn reset(&self) {
        self.context.lock().await.clear();
        debug!("Responder conversation reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dead_endpoint, serve};
    use tracing_test::traced_test;

    fn file(name: &str, text: &str) -> SearchResult {
        SearchResult {
            path: format!("/home/me/Code/app/{name}"),
            text: text.to_string(),
            file_type: "code".to_string(),
            language: "rust".to_string(),
            size_bytes: text.len() as u64,
            indexed_at: None,
            relevance_score: 1,
            phase: None,
        }
    }

    fn config_for(endpoint: String) -> ResponderConfig {
        ResponderConfig {
            endpoint,
            probe_timeout_ms: 500,
            request_timeout_ms: 2000,
            ..ResponderConfig::default()
        }
    }

    const TAGS: &str = r#"{"models":[{"name":"llama3:8b"},{"name":"nomic-embed-text"}]}"#;

    #[test]
    fn test_prompt_limits_files_and_excerpts() {
        let long = "x".repeat(EXCERPT_CHARS + 200);
        let files = vec![file("a.rs", &long), file("b.rs", "b"), file("c.rs", "c"), file("d.rs", "d")];
        let prompt = build_prompt(ResponseMode::CodeAnalysis, "what?", &files, 3);

        assert!(prompt.contains("FILE: a.rs (code/rust)"));
        assert!(prompt.contains("FILE: c.rs"));
        assert!(!prompt.contains("FILE: d.rs"));
        assert!(prompt.contains("[...truncated...]"));
        assert!(!prompt.contains(&"x".repeat(EXCERPT_CHARS + 1)));
    }

    #[test]
    fn test_general_knowledge_prompt_has_no_files() {
        let prompt = build_prompt(ResponseMode::GeneralKnowledge, "what is rust", &[file("a.rs", "a")], 3);
        assert!(!prompt.contains("PROJECT FILES"));
    }

    #[test]
    fn test_tidy_collapses_blank_runs() {
        assert_eq!(tidy("\n\n a\n\n\n\nb \n\n"), "a\n\nb");
    }

    #[test]
    fn test_offline_text_per_mode() {
        let offline = OfflineResponder::new("llama3:8b");
        let files = vec![file("main.rs", "fn main() {}"), file("lib.rs", "")];

        let analysis = offline.render(ResponseMode::CodeAnalysis, "q", &files);
        assert!(analysis.contains("Files found: 2"));
        assert!(analysis.contains("📄 main.rs (code)"));
        assert!(analysis.contains("ollama pull llama3:8b"));

        let summary = offline.render(ResponseMode::ArchitectureSummary, "q", &files);
        assert!(summary.contains("File types: code"));
        assert!(offline.render(ResponseMode::Debugging, "crash", &files).contains("• lib.rs"));
    }

    #[tokio::test]
    async fn test_generate_carries_context() -> anyhow::Result<()> {
        let server = serve(vec![
            ("/api/tags", 200, vec![TAGS.to_string()]),
            (
                "/api/generate",
                200,
                vec![
                    r#"{"response":"first\n\n\n\nanswer","context":[1,2,3]}"#.to_string(),
                    r#"{"response":"second","context":[1,2,3,4]}"#.to_string(),
                ],
            ),
        ])
        .await;
        let responder = OllamaResponder::new(config_for(server.endpoint.clone()))?;

        let files = [file("main.rs", "fn main() {}")];
        let first = responder.respond(ResponseMode::CodeAnalysis, "explain", &files).await?;
        assert_eq!(first, "first\n\nanswer");
        let second = responder.respond(ResponseMode::Debugging, "again", &files).await?;
        assert_eq!(second, "second");

        let bodies = server.requests_to("/api/generate");
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["stream"], false);
        assert_eq!(bodies[0]["model"], "llama3:8b");
        assert_eq!(bodies[0]["options"]["top_k"], 50);
        assert_eq!(bodies[0]["context"], serde_json::json!([]));
        assert_eq!(bodies[1]["context"], serde_json::json!([1, 2, 3]));

        let status = responder.status().await;
        assert!(status.running);
        assert_eq!(status.history_length, 4);
        assert_eq!(status.available_models, vec!["llama3:8b", "nomic-embed-text"]);

        responder.reset().await;
        assert_eq!(responder.status().await.history_length, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_http_error_is_reported() -> anyhow::Result<()> {
        let server = serve(vec![
            ("/api/tags", 200, vec![TAGS.to_string()]),
            ("/api/generate", 500, vec![r#"{"error":"model not found"}"#.to_string()]),
        ])
        .await;
        let responder = OllamaResponder::new(config_for(server.endpoint))?;

        match responder.respond(ResponseMode::CodeAnalysis, "q", &[]).await {
            Err(err @ ResponderError::Http { status: 500, .. }) => {
                assert!(err.to_string().starts_with("[responder]"));
                assert!(err.to_string().contains("model not found"));
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_undecodable_body() -> anyhow::Result<()> {
        let server = serve(vec![
            ("/api/tags", 200, vec![TAGS.to_string()]),
            ("/api/generate", 200, vec!["not json".to_string()]),
        ])
        .await;
        let responder = OllamaResponder::new(config_for(server.endpoint))?;

        let err = responder.respond(ResponseMode::CodeAnalysis, "q", &[]).await.unwrap_err();
        assert!(matches!(err, ResponderError::Decode(_)));
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_unreachable_backend_answers_offline() -> anyhow::Result<()> {
        let responder = OllamaResponder::new(config_for(dead_endpoint().await))?;

        assert!(!responder.is_available().await);
        let answer = responder
            .respond(ResponseMode::FeatureSuggestion, "add login", &[file("auth.rs", "")])
            .await?;
        assert!(answer.contains("Responder offline"));
        assert!(answer.contains("\"add login\""));
        assert!(!responder.status().await.running);
        assert!(logs_contain("answering offline"));
        Ok(())
    }
}
