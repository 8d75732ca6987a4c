//! Sentence-bounded text segmentation.
//!
//! Files are cut into chunks that never split a sentence. A sentence is a run of
//! text ending at one or more terminal punctuation marks (`.`, `!`, `?`), plus
//! whatever trails the last terminator. Sentences are packed greedily into a
//! buffer until the next one would push the buffer past `max_chunk_size`
//! characters.
//!
//! ```
//! use singleton_context::sentence::split;
//!
//! let chunks = split("First sentence. Second one! And a third?", 20);
//! assert_eq!(chunks, vec!["First sentence.", "Second one!", "And a third?"]);
//! ```
//!
//! Chunk identity is derived from the owning path and the chunk's position:
//!
//! ```
//! use singleton_context::sentence::chunk_id;
//!
//! assert_eq!(chunk_id("/home/me/notes.md", 2), "/home/me/notes.md_chunk_2");
//! ```

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Character limit used by the indexer unless configured otherwise.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence terminator pattern is valid"));

/// A chunk together with its position and stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// `{path}_chunk_{sequence}`
    pub chunk_id: String,
    /// Zero-based position within the file.
    pub sequence: usize,
    pub text: String,
}

/// Builds the identifier of the `index`-th chunk of `path`.
pub fn chunk_id(path: &str, index: usize) -> String {
    format!("{path}_chunk_{index}")
}

/// Splits `text` into trimmed sentences, keeping each sentence's terminator.
///
/// Pieces that are blank or made only of punctuation are dropped.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for terminator in SENTENCE_END.find_iter(text) {
        push_sentence(&mut out, &text[start..terminator.end()]);
        start = terminator.end();
    }
    push_sentence(&mut out, &text[start..]);
    out
}

fn push_sentence<'a>(out: &mut Vec<&'a str>, piece: &'a str) {
    let piece = piece.trim();
    if piece.chars().any(|c| !matches!(c, '.' | '!' | '?')) {
        out.push(piece);
    }
}

/// Packs the sentences of `text` into chunks of at most `max_chunk_size`
/// characters.
///
/// Sentences inside a chunk are joined by a single space. A sentence that is
/// longer than the limit on its own becomes a chunk by itself rather than
/// being cut. The result is never empty: input without any sentence comes back
/// as a single chunk.
pub fn split(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0;

    for sentence in sentences(text) {
        let sentence_chars = sentence.chars().count();
        if buffer_chars > 0 && buffer_chars + 1 + sentence_chars > max_chunk_size {
            chunks.push(std::mem::take(&mut buffer));
            buffer_chars = 0;
        }
        if buffer_chars > 0 {
            buffer.push(' ');
            buffer_chars += 1;
        }
        buffer.push_str(sentence);
        buffer_chars += sentence_chars;
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }
    if chunks.is_empty() {
        chunks.push(text.to_string());
    }
    chunks
}

/// Splits `text` and attaches identifiers derived from `path`.
pub fn chunk_file(path: &str, text: &str, max_chunk_size: usize) -> Vec<TextChunk> {
    split(text, max_chunk_size)
        .into_iter()
        .enumerate()
        .map(|(sequence, text)| TextChunk {
            chunk_id: chunk_id(path, sequence),
            sequence,
            text,
        })
        .collect()
}
