use super::file_kind::FileKind;
use crate::storage::Chunk;
use singleton_context::{DEFAULT_MAX_CHUNK_SIZE, chunk_file};
use tracing::debug;

pub const DEFAULT_MIN_CONTENT_CHARS: usize = 10;

/// Configuration for chunking files
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum size of each chunk in characters
    pub max_chunk_size: usize,
    /// Files whose trimmed text is shorter than this are noise
    pub min_content_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            min_content_chars: DEFAULT_MIN_CONTENT_CHARS,
        }
    }
}

impl ChunkingConfig {
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    pub fn with_min_content_chars(mut self, min_content_chars: usize) -> Self {
        self.min_content_chars = min_content_chars;
        self
    }
}

/// Strategy for chunking files - delegates the splitting to singleton-context
#[derive(Debug, Clone, Default)]
pub struct ChunkingStrategy {
    config: ChunkingConfig,
}

impl ChunkingStrategy {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Number of meaningful characters in `content`.
    pub fn content_chars(content: &str) -> usize {
        content.trim().chars().count()
    }

    /// Chunk a file's text, or `None` when it is too short to be worth indexing.
    pub fn chunk_content(&self, path_key: &str, content: &str, kind: &FileKind) -> Option<Vec<Chunk>> {
        if Self::content_chars(content) < self.config.min_content_chars {
            return None;
        }

        let chunks: Vec<Chunk> = chunk_file(path_key, content, self.config.max_chunk_size)
            .into_iter()
            .map(|chunk| Chunk {
                file_path: path_key.to_string(),
                chunk_id: chunk.chunk_id,
                text_content: chunk.text,
                file_type: kind.file_type.clone(),
                language: kind.language.clone(),
            })
            .collect();

        debug!(
            "Chunked {} into {} chunks (max size: {})",
            path_key,
            chunks.len(),
            self.config.max_chunk_size
        );
        Some(chunks)
    }
}
