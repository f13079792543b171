//! Pinecone-backed vector index.
//!
//! Wraps the Pinecone data-plane REST surface: `/vectors/upsert`,
//! `/query`, `/vectors/delete`, and `/describe_index_stats`, all scoped
//! to the configured namespace. Chunk text and metadata ride along as
//! Pinecone metadata so search results can be reconstructed without a
//! second lookup; stored vectors are not returned on query, so
//! reconstructed chunks carry an empty placeholder vector.

use super::{IndexStats, VectorIndex, clamp_score};
use crate::chunk_record::{ChunkMetadata, EmbeddedChunk, SearchResult};
use crate::config::IndexSettings;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosted vector index over a Pinecone data-plane endpoint.
pub struct PineconeIndex {
    client: reqwest::Client,
    base_url: String,
    namespace: String,
}

impl PineconeIndex {
    /// Build a client for the index host in `settings.url`.
    pub fn new(settings: &IndexSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("missing vector index API key");
        }
        if !settings.url.starts_with("http://") && !settings.url.starts_with("https://") {
            bail!("index url must be an http(s) URL: {}", settings.url);
        }
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(settings.api_key.trim())
                .context("index API key is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("failed to build index HTTP client")?;
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            namespace: settings.namespace.clone(),
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("index request to {path} failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("index request to {path} failed ({status}): {body}");
        }
        response
            .json()
            .await
            .with_context(|| format!("failed to parse index response from {path}"))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        if chunks.is_empty() {
            bail!("refusing to upsert an empty chunk list");
        }
        let vectors: Vec<WireVector> = chunks.iter().map(WireVector::from_chunk).collect();
        let request = UpsertRequest {
            vectors,
            namespace: &self.namespace,
        };
        let response: UpsertResponse = self.post("vectors/upsert", &request).await?;
        tracing::debug!(
            upserted = response.upserted_count,
            namespace = %self.namespace,
            "upserted chunks"
        );
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let request = DeleteRequest {
            ids,
            namespace: &self.namespace,
        };
        let _: serde_json::Value = self.post("vectors/delete", &request).await?;
        tracing::debug!(count = ids.len(), namespace = %self.namespace, "deleted chunks");
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        query_vector: &[f32],
        limit: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let namespace = namespace.unwrap_or(&self.namespace);
        let request = QueryRequest {
            vector: query_vector,
            top_k: limit,
            namespace,
            include_metadata: true,
        };
        let response: QueryResponse = self.post("query", &request).await?;
        tracing::debug!(
            query,
            matches = response.matches.len(),
            namespace,
            "query returned"
        );
        let mut results = Vec::with_capacity(response.matches.len());
        for matched in response.matches {
            match matched.into_result() {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unreconstructable search hit");
                }
            }
        }
        Ok(results)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let response: StatsResponse = self
            .post("describe_index_stats", &serde_json::json!({}))
            .await?;
        let total_chunks = response
            .namespaces
            .get(&self.namespace)
            .map(|ns| ns.vector_count)
            .unwrap_or(response.total_vector_count);
        Ok(IndexStats {
            total_chunks,
            // Pinecone does not track notebook counts; report zero
            // rather than erroring.
            total_notebooks: 0,
            namespace: self.namespace.clone(),
        })
    }

    async fn health_check(&self) -> bool {
        match self
            .post::<_, StatsResponse>("describe_index_stats", &serde_json::json!({}))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "index health check failed");
                false
            }
        }
    }

    fn backend_name(&self) -> &str {
        "pinecone"
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<WireVector>,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    upserted_count: u64,
}

#[derive(Serialize)]
struct WireVector {
    id: String,
    values: Vec<f32>,
    metadata: serde_json::Value,
}

impl WireVector {
    fn from_chunk(chunk: &EmbeddedChunk) -> Self {
        let mut metadata = serde_json::to_value(&chunk.metadata)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));
        if let serde_json::Value::Object(map) = &mut metadata {
            map.insert(
                "text".to_string(),
                serde_json::Value::String(chunk.text.clone()),
            );
        }
        Self {
            id: chunk.id.clone(),
            values: chunk.vector.clone(),
            metadata,
        }
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    namespace: &'a str,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<serde_json::Value>,
}

impl QueryMatch {
    fn into_result(self) -> Result<SearchResult> {
        let mut metadata = self
            .metadata
            .with_context(|| format!("match {} carried no metadata", self.id))?;
        let text = metadata
            .as_object_mut()
            .and_then(|map| map.remove("text"))
            .and_then(|value| value.as_str().map(str::to_string))
            .with_context(|| format!("match {} carried no text", self.id))?;
        let metadata: ChunkMetadata = serde_json::from_value(metadata)
            .with_context(|| format!("match {} carried malformed metadata", self.id))?;
        Ok(SearchResult {
            chunk: EmbeddedChunk {
                id: self.id,
                text,
                // Query responses omit stored vectors to save bandwidth.
                vector: Vec::new(),
                metadata,
            },
            score: clamp_score(self.score),
        })
    }
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
    #[serde(rename = "totalVectorCount", default)]
    total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
struct NamespaceStats {
    #[serde(rename = "vectorCount", default)]
    vector_count: u64,
}
