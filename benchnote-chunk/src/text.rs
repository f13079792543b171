//! Token-bounded splitting of notebook text.
//!
//! The splitter works on byte ranges over the original text. A recursive
//! pass tries each separator in priority order (paragraph break, line
//! break, sentence-ending punctuation, space) and only descends to a finer
//! separator when the current one cannot carve out a segment that fits the
//! token budget. Adjacent segments are then greedily packed back together
//! up to `chunk_size` tokens, and the tail of each packed chunk is
//! re-included at the head of the next one to provide `overlap` tokens of
//! context.
//!
//! Because segments are ranges into the source, offsets are exact and
//! chunk text is always a literal substring of the input. The only place
//! a chunk can be dropped is the raw token-slicing path, where a window
//! boundary may split a multi-byte character: such windows fail to decode
//! (or fail to locate in the source) and are discarded rather than emitted
//! with invalid offsets.

use crate::error::{ChunkError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tiktoken_rs::{CoreBPE, cl100k_base, o200k_base, p50k_base, r50k_base};

/// Separator patterns tried from most to least significant.
///
/// - `\n\n`: paragraph breaks
/// - `\n`: line breaks
/// - `[.!?] `: sentence-ending punctuation followed by a space
/// - ` `: plain spaces
///
/// Text that still exceeds the token budget after the last separator is
/// cut at character boundaries.
const SEPARATOR_PATTERNS: &[&str] = &[r"\n\n", r"\n", r"[.!?] ", r" "];

static CL100K: Lazy<CoreBPE> =
    Lazy::new(|| cl100k_base().expect("embedded cl100k_base tables are valid"));
static O200K: Lazy<CoreBPE> =
    Lazy::new(|| o200k_base().expect("embedded o200k_base tables are valid"));
static P50K: Lazy<CoreBPE> =
    Lazy::new(|| p50k_base().expect("embedded p50k_base tables are valid"));
static R50K: Lazy<CoreBPE> =
    Lazy::new(|| r50k_base().expect("embedded r50k_base tables are valid"));

fn encoder_for(name: &str) -> Result<&'static CoreBPE> {
    match name {
        "cl100k_base" => Ok(&CL100K),
        "o200k_base" => Ok(&O200K),
        "p50k_base" => Ok(&P50K),
        "r50k_base" => Ok(&R50K),
        other => Err(ChunkError::UnknownTokenizer {
            name: other.to_string(),
        }),
    }
}

/// Configuration for splitting text into token-bounded chunks.
///
/// Construction of a [`Chunker`] validates the configuration: the target
/// size must be positive, the overlap must be strictly smaller than the
/// target size, and the tokenizer must name a known byte-pair encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens.
    pub chunk_size: usize,
    /// Tokens of trailing context repeated at the head of the next chunk.
    pub overlap: usize,
    /// Identifier of the byte-pair encoding used for token counting
    /// (e.g. `cl100k_base`).
    pub tokenizer: String,
    /// Prefer paragraph/sentence/word boundaries over raw token slicing.
    pub preserve_boundaries: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 64,
            tokenizer: "cl100k_base".to_string(),
            preserve_boundaries: true,
        }
    }
}

impl ChunkingConfig {
    /// Validate the configuration without building a chunker.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkError::invalid_config("chunk_size must be positive"));
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkError::invalid_config(format!(
                "overlap ({}) must be strictly less than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        encoder_for(&self.tokenizer)?;
        Ok(())
    }
}

/// A single token-bounded segment of source text.
///
/// Offsets are character positions into the source (not byte positions),
/// so they are safe to use with multi-byte text. `chunk_index` is 0-based
/// and contiguous within one chunking call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// The text content of this chunk, including any overlap prefix.
    pub text: String,
    /// Character offset of the first character in the source text.
    pub start_offset: usize,
    /// Character offset one past the last character in the source text.
    pub end_offset: usize,
    /// Token count of `text` in the configured encoding.
    pub token_count: usize,
    /// Position of this chunk within the chunking call.
    pub chunk_index: usize,
}

/// Splits text into overlapping, token-bounded chunks.
pub struct Chunker {
    config: ChunkingConfig,
    bpe: &'static CoreBPE,
    separators: Vec<Regex>,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("config", &self.config)
            .finish()
    }
}

/// Chunk `text` with a one-off configuration.
///
/// Convenience wrapper around [`Chunker::new`] + [`Chunker::chunk`] for
/// callers that do not hold a chunker across calls.
pub fn chunk(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    Chunker::new(config.clone())?.chunk(text)
}

impl Chunker {
    /// Build a chunker, validating the configuration.
    ///
    /// Fails with [`ChunkError::InvalidConfig`] when `chunk_size` is zero
    /// or `overlap >= chunk_size`, and [`ChunkError::UnknownTokenizer`]
    /// when the tokenizer id is not a known encoding.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        let bpe = encoder_for(&config.tokenizer)?;
        let separators = SEPARATOR_PATTERNS
            .iter()
            .map(|&pattern| Regex::new(pattern).expect("separator patterns are valid"))
            .collect();
        Ok(Self {
            config,
            bpe,
            separators,
        })
    }

    /// The configuration this chunker was built with.
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Count tokens in `text` using the configured encoding.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split `text` into an ordered sequence of chunks.
    ///
    /// Fails with [`ChunkError::EmptyInput`] when the text is empty after
    /// trimming whitespace. Otherwise returns at least one chunk; chunk
    /// indexes are contiguous and offsets point back into `text`.
    pub fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        if text.trim().is_empty() {
            return Err(ChunkError::EmptyInput);
        }
        let chunks = if self.config.preserve_boundaries {
            self.chunk_by_separators(text)
        } else {
            self.chunk_by_token_windows(text)
        };
        Ok(chunks)
    }

    /// Separator-aware splitting: recursive segmentation, greedy packing,
    /// then overlap application.
    fn chunk_by_separators(&self, text: &str) -> Vec<Chunk> {
        let mut segments = Vec::new();
        self.split_recursively(text, 0, 0, &mut segments);
        let packed = self.pack_segments(text, segments);

        let mut chunks: Vec<Chunk> = Vec::new();
        for range in packed {
            if text[range.clone()].trim().is_empty() {
                continue;
            }
            // Extend the range head backwards over the previous chunk's
            // tail to realize the overlap. Ranges are contiguous, so the
            // decoded tail is a literal suffix of the source ending at
            // range.start.
            let mut start_byte = range.start;
            if let Some(prev) = chunks.last() {
                if let Some(tail) = self.overlap_tail(&prev.text) {
                    let candidate = range.start.saturating_sub(tail.len());
                    if text.is_char_boundary(candidate)
                        && text[candidate..range.start] == tail[..]
                    {
                        start_byte = candidate;
                    }
                }
            }
            let chunk_text = &text[start_byte..range.end];
            let start_offset = char_offset(text, start_byte);
            chunks.push(Chunk {
                text: chunk_text.to_string(),
                start_offset,
                end_offset: start_offset + chunk_text.chars().count(),
                token_count: self.count_tokens(chunk_text),
                chunk_index: chunks.len(),
            });
        }
        chunks
    }

    // Recursively split `text` into byte ranges no larger than the token
    // budget, trying separators from `level` downwards. Ranges cover the
    // input contiguously; delimiter matches are emitted as their own
    // segments so packing can reassemble exact substrings.
    fn split_recursively(
        &self,
        text: &str,
        level: usize,
        offset: usize,
        out: &mut Vec<Range<usize>>,
    ) {
        if text.is_empty() {
            return;
        }
        if self.count_tokens(text) <= self.config.chunk_size {
            out.push(offset..offset + text.len());
            return;
        }
        if level >= self.separators.len() {
            self.split_at_char_boundaries(text, offset, out);
            return;
        }

        let separator = &self.separators[level];
        let mut local_start = 0;
        for mat in separator.find_iter(text) {
            if mat.start() > local_start {
                self.split_recursively(
                    &text[local_start..mat.start()],
                    level + 1,
                    offset + local_start,
                    out,
                );
            }
            out.push(offset + mat.start()..offset + mat.end());
            local_start = mat.end();
        }
        if local_start < text.len() {
            self.split_recursively(&text[local_start..], level + 1, offset + local_start, out);
        }
    }

    // Last-resort split for text with no usable separators: cut at
    // character boundaries so each piece fits the token budget.
    fn split_at_char_boundaries(&self, text: &str, offset: usize, out: &mut Vec<Range<usize>>) {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let mut start = 0;
        while start + 1 < boundaries.len() {
            // Largest end boundary whose slice still fits, found by
            // bisection; each probe re-encodes the candidate slice.
            let mut lo = start + 1;
            let mut hi = boundaries.len() - 1;
            while lo < hi {
                let mid = (lo + hi).div_ceil(2);
                if self.count_tokens(&text[boundaries[start]..boundaries[mid]])
                    <= self.config.chunk_size
                {
                    lo = mid;
                } else {
                    hi = mid - 1;
                }
            }
            out.push(offset + boundaries[start]..offset + boundaries[lo]);
            start = lo;
        }
    }

    // Greedily merge consecutive segment ranges while the combined slice
    // stays within the token budget.
    fn pack_segments(&self, text: &str, segments: Vec<Range<usize>>) -> Vec<Range<usize>> {
        let mut packed: Vec<Range<usize>> = Vec::new();
        let mut current: Option<Range<usize>> = None;
        for segment in segments {
            current = match current {
                None => Some(segment),
                Some(range) => {
                    let candidate = range.start..segment.end;
                    if self.count_tokens(&text[candidate.clone()]) <= self.config.chunk_size {
                        Some(candidate)
                    } else {
                        packed.push(range);
                        Some(segment)
                    }
                }
            };
        }
        if let Some(range) = current {
            packed.push(range);
        }
        packed
    }

    // Decode the trailing `overlap` tokens of `text`. Shrinks the tail by
    // one token at a time if a token boundary splits a multi-byte
    // character; returns None when overlap is disabled or nothing decodes.
    fn overlap_tail(&self, text: &str) -> Option<String> {
        if self.config.overlap == 0 {
            return None;
        }
        let tokens = self.bpe.encode_ordinary(text);
        let mut take = self.config.overlap.min(tokens.len());
        while take > 0 {
            if let Ok(tail) = self.bpe.decode(tokens[tokens.len() - take..].to_vec()) {
                return Some(tail);
            }
            take -= 1;
        }
        None
    }

    /// Plain token-window slicing for `preserve_boundaries == false`.
    ///
    /// Windows advance by `chunk_size - overlap` tokens. A window whose
    /// boundary splits a multi-byte character fails to decode, and a
    /// decoded window that cannot be located in the source is dropped
    /// rather than emitted with invalid offsets.
    fn chunk_by_token_windows(&self, text: &str) -> Vec<Chunk> {
        let tokens = self.bpe.encode_ordinary(text);
        let stride = self.config.chunk_size - self.config.overlap;
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut search_from = 0usize;
        let mut window_start = 0usize;
        while window_start < tokens.len() {
            let window_end = (window_start + self.config.chunk_size).min(tokens.len());
            if let Ok(piece) = self.bpe.decode(tokens[window_start..window_end].to_vec()) {
                if let Some(found) = text[search_from..].find(&piece) {
                    let begin = search_from + found;
                    let start_offset = char_offset(text, begin);
                    chunks.push(Chunk {
                        token_count: window_end - window_start,
                        start_offset,
                        end_offset: start_offset + piece.chars().count(),
                        text: piece,
                        chunk_index: chunks.len(),
                    });
                    // The next window starts `overlap` tokens before this
                    // window's end, so resume the search inside it.
                    search_from = begin;
                }
            }
            if window_end == tokens.len() {
                break;
            }
            window_start += stride;
        }
        chunks
    }
}

// Convert a byte offset into a character offset.
fn char_offset(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
            ..ChunkingConfig::default()
        }
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let result = Chunker::new(config(0, 0));
        assert!(matches!(result, Err(ChunkError::InvalidConfig { .. })));
    }

    #[test]
    fn rejects_overlap_not_less_than_chunk_size() {
        assert!(matches!(
            Chunker::new(config(64, 64)),
            Err(ChunkError::InvalidConfig { .. })
        ));
        assert!(matches!(
            Chunker::new(config(64, 100)),
            Err(ChunkError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn rejects_unknown_tokenizer() {
        let cfg = ChunkingConfig {
            tokenizer: "morse-code".to_string(),
            ..ChunkingConfig::default()
        };
        assert!(matches!(
            Chunker::new(cfg),
            Err(ChunkError::UnknownTokenizer { .. })
        ));
    }

    #[test]
    fn rejects_empty_input() {
        let chunker = Chunker::new(ChunkingConfig::default()).unwrap();
        assert!(matches!(chunker.chunk(""), Err(ChunkError::EmptyInput)));
        assert!(matches!(
            chunker.chunk("   \n\t  "),
            Err(ChunkError::EmptyInput)
        ));
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = Chunker::new(ChunkingConfig::default()).unwrap();
        let text = "Seeded the culture at 09:30 and moved it to the shaker.";
        let chunks = chunker.chunk(text).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, text.chars().count());
        assert!(chunks[0].token_count > 0);
    }

    #[test]
    fn chunking_is_deterministic() {
        let chunker = Chunker::new(config(32, 8)).unwrap();
        let text = (0..40)
            .map(|i| format!("Measurement {i} came back within tolerance. "))
            .collect::<String>();
        let first = chunker.chunk(&text).unwrap();
        let second = chunker.chunk(&text).unwrap();
        assert_eq!(first, second);
        assert!(first.len() > 1);
    }

    #[test]
    fn long_text_splits_with_contiguous_indexes() {
        let chunker = Chunker::new(config(32, 8)).unwrap();
        let text = (0..50)
            .map(|i| format!("Sample {i} was incubated overnight at 37 degrees.\n\n"))
            .collect::<String>();
        let chunks = chunker.chunk(&text).unwrap();
        assert!(chunks.len() > 1);
        let mut last_start = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert!(!chunk.text.trim().is_empty());
            assert!(chunk.token_count > 0);
            assert!(chunk.start_offset >= last_start);
            assert!(chunk.start_offset < chunk.end_offset);
            last_start = chunk.start_offset;
        }
    }

    #[test]
    fn overlap_repeats_previous_tail() {
        let chunker = Chunker::new(config(24, 6)).unwrap();
        let text = (0..30)
            .map(|i| format!("Run {i} logged a stable baseline reading. "))
            .collect::<String>();
        let chunks = chunker.chunk(&text).unwrap();
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            // The next chunk starts before the previous one ends, and the
            // shared region is literally repeated.
            assert!(pair[1].start_offset < pair[0].end_offset);
            let shared = pair[0].end_offset - pair[1].start_offset;
            let head: String = pair[1].text.chars().take(shared).collect();
            assert!(pair[0].text.ends_with(&head));
        }
    }

    #[test]
    fn offsets_are_character_positions() {
        let chunker = Chunker::new(ChunkingConfig::default()).unwrap();
        let text = "pH méter calibrated — ±0.02 drift über 4h";
        let chunks = chunker.chunk(text).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end_offset, text.chars().count());
        assert!(text.chars().count() < text.len());
    }

    #[test]
    fn offsets_locate_chunks_in_multibyte_text() {
        let chunker = Chunker::new(config(16, 4)).unwrap();
        let text = (0..25)
            .map(|i| format!("Probe {i} zeigte eine stabile Färbung im Gewebe. "))
            .collect::<String>();
        let source_chars: Vec<char> = text.chars().collect();
        let chunks = chunker.chunk(&text).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            let located: String = source_chars[chunk.start_offset..chunk.end_offset]
                .iter()
                .collect();
            assert_eq!(located, chunk.text);
        }
    }

    #[test]
    fn token_counts_use_the_encoding_not_characters() {
        let chunker = Chunker::new(ChunkingConfig::default()).unwrap();
        let text = "The supernatant was decanted and the pellet resuspended in buffer.";
        let chunks = chunker.chunk(text).unwrap();
        assert!(chunks[0].token_count < text.chars().count());
        assert_eq!(chunks[0].token_count, chunker.count_tokens(text));
    }

    #[test]
    fn unbroken_text_falls_back_to_character_cuts() {
        let chunker = Chunker::new(config(16, 0)).unwrap();
        let text = "ACGT".repeat(200);
        let chunks = chunker.chunk(&text).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 16);
        }
        let reassembled: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(reassembled, text);
    }

    #[test]
    fn token_window_mode_slices_by_stride() {
        let cfg = ChunkingConfig {
            preserve_boundaries: false,
            ..config(20, 5)
        };
        let chunker = Chunker::new(cfg).unwrap();
        let text = (0..30)
            .map(|i| format!("Aliquot {i} was frozen at minus eighty. "))
            .collect::<String>();
        let total_tokens = chunker.count_tokens(&text);
        let chunks = chunker.chunk(&text).unwrap();
        assert!(chunks.len() > 1);
        // Every full window carries exactly chunk_size tokens.
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.token_count, 20);
        }
        let expected = total_tokens.div_ceil(15);
        assert!(chunks.len() <= expected + 1);
        // Same slicing on a second run.
        assert_eq!(chunks, chunker.chunk(&text).unwrap());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: ChunkingConfig = serde_json::from_str(r#"{"chunk_size": 256}"#).unwrap();
        assert_eq!(cfg.chunk_size, 256);
        assert_eq!(cfg.overlap, 64);
        assert_eq!(cfg.tokenizer, "cl100k_base");
        assert!(cfg.preserve_boundaries);
        cfg.validate().unwrap();
    }
}
