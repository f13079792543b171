//! In-memory vector index.
//!
//! Backs tests and local runs with the same contract as the hosted
//! backend: idempotent upsert by id, namespace scoping, clamped cosine
//! scores, and placeholder vectors on search results.

use super::{IndexStats, VectorIndex, clamp_score};
use crate::chunk_record::{EmbeddedChunk, SearchResult};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Process-local index keyed by namespace, then chunk id.
pub struct MemoryIndex {
    default_namespace: String,
    namespaces: RwLock<HashMap<String, HashMap<String, EmbeddedChunk>>>,
}

impl MemoryIndex {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            default_namespace: namespace.into(),
            namespaces: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        if chunks.is_empty() {
            bail!("refusing to upsert an empty chunk list");
        }
        let mut namespaces = self.namespaces.write().await;
        let space = namespaces
            .entry(self.default_namespace.clone())
            .or_default();
        for chunk in chunks {
            space.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut namespaces = self.namespaces.write().await;
        if let Some(space) = namespaces.get_mut(&self.default_namespace) {
            for id in ids {
                space.remove(id);
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        _query: &str,
        query_vector: &[f32],
        limit: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let namespaces = self.namespaces.read().await;
        let namespace = namespace.unwrap_or(&self.default_namespace);
        let Some(space) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        let mut results: Vec<SearchResult> = space
            .values()
            .map(|chunk| SearchResult {
                score: clamp_score(cosine_similarity(query_vector, &chunk.vector)),
                chunk: EmbeddedChunk {
                    // Same contract as hosted backends: no stored
                    // vectors on the read path.
                    vector: Vec::new(),
                    ..chunk.clone()
                },
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let namespaces = self.namespaces.read().await;
        let space = namespaces.get(&self.default_namespace);
        let total_chunks = space.map(|s| s.len() as u64).unwrap_or(0);
        let total_notebooks = space
            .map(|s| {
                s.values()
                    .map(|c| c.metadata.notebook_id.as_str())
                    .collect::<HashSet<_>>()
                    .len() as u64
            })
            .unwrap_or(0);
        Ok(IndexStats {
            total_chunks,
            total_notebooks,
            namespace: self.default_namespace.clone(),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
