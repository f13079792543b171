//! # benchnote-chunk
//!
//! Deterministic, token-bounded text chunking for notebook content.
//!
//! Raw notebook text is split into overlapping segments sized for embedding
//! models. Splitting prefers natural boundaries (paragraphs, lines,
//! sentences, words) and only falls back to character-level cuts when a
//! single run of text exceeds the token budget on its own. Every chunk
//! carries character offsets back into the source text and a token count
//! in the configured encoding.
//!
//! Chunking is a pure function of `(text, config)`: no I/O, no randomness,
//! no mutable process state. Re-chunking the same text with the same
//! configuration always yields the same chunks, which is what makes chunk
//! identities stable across index rebuilds.
//!
//! ## Quick Start
//!
//! ```
//! use benchnote_chunk::{Chunker, ChunkingConfig};
//!
//! let chunker = Chunker::new(ChunkingConfig::default()).unwrap();
//! let chunks = chunker.chunk("Observed rapid crystal growth after seeding.").unwrap();
//! assert_eq!(chunks[0].chunk_index, 0);
//! assert!(chunks[0].token_count > 0);
//! ```

pub mod error;
pub mod text;

pub use error::{ChunkError, Result};
pub use text::{Chunk, Chunker, ChunkingConfig, chunk};
