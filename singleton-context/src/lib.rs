//! # singleton-context
//!
//! Text segmentation for the singleton indexer. File contents are split into
//! sentence-bounded chunks small enough to embed and to show as search context.
//!
//! - [`sentence::split`] packs sentences into chunks under a character limit.
//! - [`sentence::chunk_id`] derives the stable `{path}_chunk_{n}` identifier.
//! - [`sentence::chunk_file`] does both at once.

pub mod sentence;

pub use sentence::{DEFAULT_MAX_CHUNK_SIZE, TextChunk, chunk_file, chunk_id, split};
