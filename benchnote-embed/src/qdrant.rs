//! Qdrant Cloud Inference embeddings transport.

use crate::config::EmbeddingConfig;
use crate::error::{EmbedError, Result};
use crate::provider::EmbeddingApi;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One-round-trip client for Qdrant Cloud Inference.
///
/// `base_url` must be the full inference endpoint, e.g.
/// `https://cluster-id.cloud.qdrant.io/inference/text`.
pub struct QdrantInferenceApi {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout_seconds: u64,
}

impl QdrantInferenceApi {
    /// Build a transport from the embedding configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EmbedError::invalid_config("missing embedding API key"));
        }
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(EmbedError::invalid_config(
                "Qdrant endpoint must be an http(s) URL",
            ));
        }
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(config.api_key.trim())
                .map_err(|_| EmbedError::invalid_config("API key is not a valid header value"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.base_url.trim_end_matches('/').to_string(),
            model: config.model_name()?.to_string(),
            timeout_seconds: config.timeout_seconds,
        })
    }
}

#[async_trait]
impl EmbeddingApi for QdrantInferenceApi {
    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = InferenceRequest {
            model: &self.model,
            inputs: texts,
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await;
        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    let payload: InferenceResponse = resp
                        .json()
                        .await
                        .map_err(|e| EmbedError::malformed(e.to_string()))?;
                    payload.into_embeddings(texts.len())
                } else if status == StatusCode::TOO_MANY_REQUESTS {
                    Err(EmbedError::RateLimited)
                } else {
                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    Err(EmbedError::Api {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
            Err(err) if err.is_timeout() => Err(EmbedError::Timeout {
                seconds: self.timeout_seconds,
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

// Clusters answer with either `data` entries or a bare `embeddings` list
// depending on deployment age.
#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    data: Vec<InferenceData>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl InferenceResponse {
    fn into_embeddings(self, expected_len: usize) -> Result<Vec<Vec<f32>>> {
        if !self.data.is_empty() {
            if self.data.len() != expected_len {
                return Err(EmbedError::malformed(format!(
                    "{} embeddings returned for {} inputs",
                    self.data.len(),
                    expected_len
                )));
            }
            let mut data = self.data;
            data.sort_by_key(|d| d.index.unwrap_or(0));
            return Ok(data.into_iter().map(|d| d.embedding).collect());
        }
        if !self.embeddings.is_empty() {
            if self.embeddings.len() != expected_len {
                return Err(EmbedError::malformed(format!(
                    "{} embeddings returned for {} inputs",
                    self.embeddings.len(),
                    expected_len
                )));
            }
            return Ok(self.embeddings);
        }
        Err(EmbedError::malformed("response missing embedding payloads"))
    }
}

#[derive(Debug, Deserialize)]
struct InferenceData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}
