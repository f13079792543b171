//! OpenAI-compatible embeddings transport.

use crate::config::EmbeddingConfig;
use crate::error::{EmbedError, Result};
use crate::provider::EmbeddingApi;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One-round-trip client for OpenAI-compatible `/embeddings` endpoints.
///
/// Carries no retry policy; [`EmbeddingClient`](crate::EmbeddingClient)
/// owns that. The request timeout is applied at client-build time.
pub struct OpenAiCompatApi {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    timeout_seconds: u64,
}

impl OpenAiCompatApi {
    /// Build a transport from the embedding configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EmbedError::invalid_config("missing embedding API key"));
        }
        let auth = format!("Bearer {}", config.api_key.trim());
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbedError::invalid_config("API key is not a valid header value"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model_name()?.to_string(),
            dimensions: config.dimensions,
            timeout_seconds: config.timeout_seconds,
        })
    }
}

#[async_trait]
impl EmbeddingApi for OpenAiCompatApi {
    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: Some(self.dimensions),
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await;
        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    let mut parsed: EmbeddingResponse = resp
                        .json()
                        .await
                        .map_err(|e| EmbedError::malformed(e.to_string()))?;
                    parsed.data.sort_by_key(|entry| entry.index);
                    Ok(parsed
                        .data
                        .into_iter()
                        .map(|entry| entry.embedding)
                        .collect())
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
        "openai"
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
