//! Vector index abstraction.
//!
//! The pipeline only ever talks to [`VectorIndex`]; concrete backends
//! wrap a hosted vector database ([`pinecone`]) or an in-process map
//! ([`memory`]). The backend is chosen once, from configuration, in
//! [`open_index`]; no call site matches on backend names.

use crate::chunk_record::{EmbeddedChunk, SearchResult};
use crate::config::{IndexBackendKind, IndexSettings};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub mod memory;
pub mod pinecone;

pub use memory::MemoryIndex;
pub use pinecone::PineconeIndex;

/// Aggregate counts reported by a backend.
///
/// Backends that do not track a field report zero for it rather than
/// erroring; `total_notebooks` in particular is unknown to hosted
/// backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_chunks: u64,
    pub total_notebooks: u64,
    pub namespace: String,
}

/// Backend-agnostic vector index operations.
///
/// Writes are scoped to the namespace the backend was constructed with;
/// `search` may override the namespace for read-side multi-tenancy.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Write or overwrite chunks by id. Rejects an empty list.
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Remove entries by id. No-op on an empty list.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Ranked similarity search. Scores are clamped into `[0, 1]` and
    /// result chunks carry placeholder vectors.
    async fn search(
        &self,
        query: &str,
        query_vector: &[f32],
        limit: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<SearchResult>>;

    /// Counts of stored items.
    async fn stats(&self) -> Result<IndexStats>;

    /// Liveness probe. Never errors: failures map to `false`.
    async fn health_check(&self) -> bool;

    /// Short backend name for logging and build records.
    fn backend_name(&self) -> &str;
}

/// Open the configured backend.
///
/// This is the single dispatch point from configuration to a concrete
/// [`VectorIndex`] implementation.
pub fn open_index(settings: &IndexSettings) -> Result<Box<dyn VectorIndex>> {
    match settings.backend {
        IndexBackendKind::Pinecone => Ok(Box::new(PineconeIndex::new(settings)?)),
        IndexBackendKind::Memory => Ok(Box::new(MemoryIndex::new(&settings.namespace))),
    }
}

/// Clamp a backend-reported similarity into `[0, 1]`.
///
/// Some backends return scores fractionally outside the range due to
/// floating-point drift.
pub(crate) fn clamp_score(score: f32) -> f32 {
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_clamp_into_unit_range() {
        assert_eq!(clamp_score(1.000_000_36), 1.0);
        assert_eq!(clamp_score(-0.000_01), 0.0);
        assert_eq!(clamp_score(0.73), 0.73);
    }

    #[test]
    fn registry_opens_the_configured_backend() {
        let settings = IndexSettings {
            backend: IndexBackendKind::Memory,
            ..IndexSettings::default()
        };
        let index = open_index(&settings).unwrap();
        assert_eq!(index.backend_name(), "memory");
    }

    #[test]
    fn hosted_backend_requires_credentials() {
        let settings = IndexSettings {
            backend: IndexBackendKind::Pinecone,
            url: "https://benchnote-abc123.svc.us-east-1.pinecone.io".to_string(),
            ..IndexSettings::default()
        };
        // No API key injected.
        assert!(open_index(&settings).is_err());
    }
}
