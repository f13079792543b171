//! Page indexing orchestration.
//!
//! One page flows end to end through [`NotebookIndexer::index_page`]:
//! indexable entries are cleaned of markup, chunked independently, and
//! embedded in one logical batch for the whole page (sub-batched only
//! when the page's chunk count exceeds the embedding batch limit), then
//! upserted as a single call. A page with nothing indexable is a
//! zero-count success that touches neither the embedding API nor the
//! index.

use crate::chunk_record::{ChunkMetadata, EmbeddedChunk, EntryType, SearchResult};
use crate::notebook::{HitConsumer, NotebookEntry, NotebookPage, parse_timestamp};
use crate::storage::VectorIndex;
use anyhow::{Context, Result};
use benchnote_chunk::{Chunk, Chunker};
use benchnote_embed::EmbeddingClient;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Counts returned from indexing one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIndexOutcome {
    /// Chunks written to the index.
    pub indexed_count: usize,
    /// Entries skipped: non-text part types and empty-after-cleaning text.
    pub skipped_count: usize,
    pub page_id: String,
}

/// Orchestrates extract → chunk → embed → upsert for notebook pages.
pub struct NotebookIndexer {
    chunker: Chunker,
    embedder: EmbeddingClient,
    index: Arc<dyn VectorIndex>,
}

impl NotebookIndexer {
    pub fn new(chunker: Chunker, embedder: EmbeddingClient, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            chunker,
            embedder,
            index,
        }
    }

    /// The vector index this indexer writes to.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Index one page end to end.
    pub async fn index_page(&self, page: &NotebookPage) -> Result<PageIndexOutcome> {
        let mut skipped = 0usize;
        let mut extracted: Vec<(&NotebookEntry, EntryType, String)> = Vec::new();
        for entry in &page.entries {
            match EntryType::from_part_type(&entry.normalized_part_type()) {
                Ok(entry_type) if entry_type.is_indexable() => {
                    let text = strip_markup(&entry.content);
                    if text.trim().is_empty() {
                        skipped += 1;
                    } else {
                        extracted.push((entry, entry_type, text));
                    }
                }
                _ => skipped += 1,
            }
        }

        if extracted.is_empty() {
            tracing::debug!(page_id = %page.page_id, skipped, "page has no indexable text");
            return Ok(PageIndexOutcome {
                indexed_count: 0,
                skipped_count: skipped,
                page_id: page.page_id.clone(),
            });
        }

        // Chunk every entry independently, then embed the whole page in
        // one logical batch to amortize request overhead.
        let mut pending: Vec<(&NotebookEntry, EntryType, Chunk)> = Vec::new();
        for (entry, entry_type, text) in &extracted {
            let chunks = self
                .chunker
                .chunk(text)
                .with_context(|| format!("failed to chunk entry {}", entry.id))?;
            for chunk in chunks {
                pending.push((*entry, *entry_type, chunk));
            }
        }

        let texts: Vec<String> = pending.iter().map(|(_, _, c)| c.text.clone()).collect();
        let vectors = self.embed_page_batch(&texts).await?;

        let embedding_version = self.embedder.config().version.clone();
        let mut embedded = Vec::with_capacity(pending.len());
        for ((entry, entry_type, chunk), vector) in pending.into_iter().zip(vectors) {
            let metadata = ChunkMetadata::new(
                &page.notebook_id,
                &page.notebook_title,
                &page.page_id,
                &page.title,
                &entry.id,
                entry_type,
                &page.author,
                entry_date(entry),
                &page.url,
                &embedding_version,
            )?
            .with_folder_path(page.folder_path.clone())
            .with_tags(page.tags.clone());
            embedded.push(EmbeddedChunk::new(
                metadata,
                chunk.chunk_index,
                chunk.text,
                vector,
            )?);
        }

        self.index
            .upsert(&embedded)
            .await
            .with_context(|| format!("failed to upsert page {}", page.page_id))?;
        tracing::info!(
            page_id = %page.page_id,
            indexed = embedded.len(),
            skipped,
            "indexed page"
        );
        Ok(PageIndexOutcome {
            indexed_count: embedded.len(),
            skipped_count: skipped,
            page_id: page.page_id.clone(),
        })
    }

    // One logical batch per page. Pages whose chunk count exceeds the
    // embedding batch limit are split into consecutive sub-batches and
    // the results concatenated in order.
    async fn embed_page_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.embedder.config().batch_size;
        let mut vectors = Vec::with_capacity(texts.len());
        for sub_batch in texts.chunks(batch_size) {
            vectors.extend(
                self.embedder
                    .embed_batch(sub_batch)
                    .await
                    .context("page embedding batch failed")?,
            );
        }
        Ok(vectors)
    }

    /// Embed the query and return ranked hits from the index.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query_vector = self
            .embedder
            .embed_single(query)
            .await
            .context("failed to embed search query")?;
        self.index.search(query, &query_vector, limit, None).await
    }

    /// Run a search and hand the ranked hits to a consumer.
    pub async fn search_into(
        &self,
        query: &str,
        limit: usize,
        consumer: &mut dyn HitConsumer,
    ) -> Result<usize> {
        let hits = self.search(query, limit).await?;
        consumer.accept(&hits);
        Ok(hits.len())
    }
}

// Entry creation date for metadata; falls back through the update stamp
// to "now" when nothing parses.
fn entry_date(entry: &NotebookEntry) -> DateTime<Utc> {
    entry
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| entry.updated_at.as_deref().and_then(parse_timestamp))
        .unwrap_or_else(Utc::now)
}

static BREAK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</(p|div|h[1-6]|li|tr)>|<br\s*/?>").expect("static pattern compiles")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static pattern compiles"));
static MULTI_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("static pattern compiles"));

/// Strip notebook markup down to plain text.
///
/// Block-closing tags become line breaks so paragraph structure survives
/// for the chunker, remaining tags are removed, and the handful of
/// entities the notebook service emits are decoded. Full HTML parsing
/// belongs to the fetching client; entry content at this point is
/// already well-formed fragments.
pub fn strip_markup(content: &str) -> String {
    let text = BREAK_TAG_RE.replace_all(content, "\n");
    let text = TAG_RE.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let text = MULTI_SPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}
