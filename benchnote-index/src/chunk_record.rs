//! Embedded chunk identity, metadata, and validation.
//!
//! Everything here fails fast: a chunk or metadata value that violates
//! its invariants never gets constructed, so nothing downstream has to
//! re-check ids, vectors, or entry types.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Bounds on stored chunk text, in characters.
const MAX_CHUNK_TEXT_CHARS: usize = 5000;

/// Bounds on stored vector dimensions.
const MIN_VECTOR_DIMS: usize = 768;
const MAX_VECTOR_DIMS: usize = 3072;

/// The fixed set of entry part types the index understands.
///
/// Parsed from normalized part-type strings; anything outside this set is
/// rejected rather than coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Text,
    Heading,
    PlainText,
    AttachmentMetadata,
}

impl EntryType {
    /// Parse a normalized part-type string (see
    /// [`NotebookEntry::normalized_part_type`](crate::notebook::NotebookEntry::normalized_part_type)).
    pub fn from_part_type(normalized: &str) -> Result<Self> {
        match normalized {
            "text" => Ok(Self::Text),
            "heading" => Ok(Self::Heading),
            "plain_text" => Ok(Self::PlainText),
            "attachment_metadata" => Ok(Self::AttachmentMetadata),
            other => bail!("unknown entry type: {other}"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Heading => "heading",
            Self::PlainText => "plain_text",
            Self::AttachmentMetadata => "attachment_metadata",
        }
    }

    /// Whether entries of this type carry indexable text.
    ///
    /// Attachment metadata is a valid stored type but contributes no text
    /// to the index.
    pub fn is_indexable(&self) -> bool {
        matches!(self, Self::Text | Self::Heading | Self::PlainText)
    }
}

/// Provenance metadata attached to every embedded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub notebook_id: String,
    pub notebook_title: String,
    pub page_id: String,
    pub page_title: String,
    pub entry_id: String,
    pub entry_type: EntryType,
    pub author: String,
    pub entry_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Resolvable URL back to the source page.
    pub url: String,
    /// Version tag of the embedding model that produced the vector.
    pub embedding_version: String,
}

impl ChunkMetadata {
    /// Build metadata, validating the URL and the identifier fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        notebook_id: impl Into<String>,
        notebook_title: impl Into<String>,
        page_id: impl Into<String>,
        page_title: impl Into<String>,
        entry_id: impl Into<String>,
        entry_type: EntryType,
        author: impl Into<String>,
        entry_date: DateTime<Utc>,
        url: impl Into<String>,
        embedding_version: impl Into<String>,
    ) -> Result<Self> {
        let url = url.into();
        if Url::parse(&url).is_err() {
            bail!("metadata url is not resolvable: {url}");
        }
        let metadata = Self {
            notebook_id: notebook_id.into(),
            notebook_title: notebook_title.into(),
            page_id: page_id.into(),
            page_title: page_title.into(),
            entry_id: entry_id.into(),
            entry_type,
            author: author.into(),
            entry_date,
            folder_path: None,
            tags: Vec::new(),
            url,
            embedding_version: embedding_version.into(),
        };
        for (name, value) in [
            ("notebook_id", &metadata.notebook_id),
            ("page_id", &metadata.page_id),
            ("entry_id", &metadata.entry_id),
        ] {
            if value.trim().is_empty() {
                bail!("metadata {name} must not be empty");
            }
        }
        Ok(metadata)
    }

    /// Set the folder path (builder style).
    pub fn with_folder_path(mut self, folder_path: Option<String>) -> Self {
        self.folder_path = folder_path;
        self
    }

    /// Set the tags (builder style).
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A chunk with its embedding vector, ready for upsert.
///
/// The id is the idempotency key: re-indexing the same logical chunk
/// overwrites the stored entry instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// Composite key `{notebook}_{page}_{entry}_{chunk_index}`.
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl EmbeddedChunk {
    /// Build an embedded chunk, deriving its id from the metadata.
    ///
    /// Validates the text length (1–5000 characters), the vector
    /// dimension (768–3072) and finiteness, and that the derived id
    /// decomposes into at least four underscore-separated parts.
    pub fn new(
        metadata: ChunkMetadata,
        chunk_index: usize,
        text: impl Into<String>,
        vector: Vec<f32>,
    ) -> Result<Self> {
        let text = text.into();
        let text_chars = text.chars().count();
        if text_chars == 0 || text_chars > MAX_CHUNK_TEXT_CHARS {
            bail!(
                "chunk text must be 1..={MAX_CHUNK_TEXT_CHARS} characters, got {text_chars}"
            );
        }
        if !(MIN_VECTOR_DIMS..=MAX_VECTOR_DIMS).contains(&vector.len()) {
            bail!(
                "chunk vector must have {MIN_VECTOR_DIMS}..={MAX_VECTOR_DIMS} dimensions, got {}",
                vector.len()
            );
        }
        if vector.iter().any(|v| !v.is_finite()) {
            bail!("chunk vector contains non-finite values");
        }
        let id = format!(
            "{}_{}_{}_{}",
            metadata.notebook_id, metadata.page_id, metadata.entry_id, chunk_index
        );
        if id.split('_').count() < 4 {
            bail!("chunk id '{id}' does not decompose into notebook/page/entry/index");
        }
        Ok(Self {
            id,
            text,
            vector,
            metadata,
        })
    }
}

/// One ranked search hit.
///
/// `score` is clamped into `[0, 1]`. The chunk's `vector` is a
/// placeholder (backends do not return stored vectors on query), so
/// callers must not read anything into it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk: EmbeddedChunk,
    pub score: f32,
}
