//! Embedding client and the transport seam it drives

use crate::config::EmbeddingConfig;
use crate::error::{EmbedError, Result};
use crate::openai::OpenAiCompatApi;
use crate::qdrant::QdrantInferenceApi;
use async_trait::async_trait;
use std::sync::Arc;

/// A single embedding network round trip.
///
/// Implementations translate one batch request into one provider call and
/// classify the outcome into the [`EmbedError`] taxonomy. All policy
/// (batching limits, retries, backoff, dimension validation) lives in
/// [`EmbeddingClient`], which keeps transports trivially small and lets
/// tests script failures without a network.
#[async_trait]
pub trait EmbeddingApi: Send + Sync {
    /// Embed one batch of texts, returning vectors in input order.
    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Short provider name for logging.
    fn name(&self) -> &str;
}

/// Resolve the transport for a provider-qualified model id.
///
/// This is the only place provider strings are interpreted; everything
/// downstream works against the [`EmbeddingApi`] trait.
fn build_api(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingApi>> {
    match config.provider()? {
        "openai" => Ok(Arc::new(OpenAiCompatApi::new(config)?)),
        "qdrant" => Ok(Arc::new(QdrantInferenceApi::new(config)?)),
        other => Err(EmbedError::UnknownProvider {
            name: other.to_string(),
        }),
    }
}

/// Batched embedding client with retry discipline.
///
/// Retry policy per attempt: a timeout backs off `2^attempt` seconds, a
/// rate limit backs off `2^(attempt + 1)` seconds, and anything else
/// propagates immediately. A dimension mismatch in a successful response
/// is fatal: it signals a model/config contract break that retrying
/// cannot repair.
#[derive(Clone)]
pub struct EmbeddingClient {
    api: Arc<dyn EmbeddingApi>,
    config: EmbeddingConfig,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("provider", &self.api.name())
            .field("model", &self.config.model)
            .field("dimensions", &self.config.dimensions)
            .finish()
    }
}

impl EmbeddingClient {
    /// Build a client, selecting the transport from the model's provider
    /// prefix.
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        let api = build_api(&config)?;
        Ok(Self { api, config })
    }

    /// Build a client around an explicit transport.
    ///
    /// Used by tests and by callers that already hold a transport; the
    /// configuration is still validated.
    pub fn with_api(config: EmbeddingConfig, api: Arc<dyn EmbeddingApi>) -> Result<Self> {
        config.validate()?;
        Ok(Self { api, config })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Dimension of every vector this client returns.
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Embed a batch of texts, returning vectors in input order.
    ///
    /// Empty input returns an empty result without a network call. A
    /// batch larger than the configured `batch_size` fails with
    /// [`EmbedError::BatchTooLarge`] before any request is made.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > self.config.batch_size {
            return Err(EmbedError::BatchTooLarge {
                actual: texts.len(),
                limit: self.config.batch_size,
            });
        }

        let mut last_transient: Option<EmbedError> = None;
        for attempt in 0..self.config.max_retries {
            match self.api.request_batch(texts).await {
                Ok(vectors) => {
                    self.validate_vectors(texts.len(), &vectors)?;
                    return Ok(vectors);
                }
                Err(err) => match err.retry_backoff(attempt) {
                    Some(delay) => {
                        if attempt + 1 < self.config.max_retries {
                            tracing::warn!(
                                provider = self.api.name(),
                                attempt,
                                delay_secs = delay.as_secs(),
                                error = %err,
                                "transient embedding failure, backing off"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        last_transient = Some(err);
                    }
                    None => return Err(err),
                },
            }
        }
        Err(
            last_transient.unwrap_or(EmbedError::RetriesExhausted {
                attempts: self.config.max_retries,
            }),
        )
    }

    /// Embed a single text. Sugar for a one-element batch.
    pub async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::malformed("provider returned no vector for single input"))
    }

    fn validate_vectors(&self, expected_len: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != expected_len {
            return Err(EmbedError::malformed(format!(
                "{} vectors returned for {} inputs",
                vectors.len(),
                expected_len
            )));
        }
        for vector in vectors {
            if vector.len() != self.config.dimensions {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.config.dimensions,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that replays a scripted sequence of outcomes.
    struct ScriptedApi {
        calls: AtomicUsize,
        script: Mutex<VecDeque<Result<Vec<Vec<f32>>>>>,
    }

    impl ScriptedApi {
        fn new(script: Vec<Result<Vec<Vec<f32>>>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingApi for ScriptedApi {
        async fn request_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("scripted api exhausted"))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn test_config() -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions: 128,
            batch_size: 4,
            max_retries: 3,
            ..EmbeddingConfig::default()
        }
    }

    fn vectors_of(count: usize, dimension: usize) -> Vec<Vec<f32>> {
        (0..count).map(|i| vec![i as f32; dimension]).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_then_success_makes_exactly_two_calls() {
        let api = ScriptedApi::new(vec![Err(EmbedError::RateLimited), Ok(vectors_of(1, 128))]);
        let client = EmbeddingClient::with_api(test_config(), api.clone()).unwrap();

        let result = client.embed_batch(&["hello".to_string()]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].len(), 128);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_exhaust_retries_and_surface_last_error() {
        let api = ScriptedApi::new(vec![
            Err(EmbedError::Timeout { seconds: 30 }),
            Err(EmbedError::Timeout { seconds: 30 }),
            Err(EmbedError::Timeout { seconds: 30 }),
        ]);
        let client = EmbeddingClient::with_api(test_config(), api.clone()).unwrap();

        let err = client.embed_batch(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbedError::Timeout { .. }));
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test]
    async fn non_retryable_failure_propagates_immediately() {
        let api = ScriptedApi::new(vec![Err(EmbedError::Api {
            status: 500,
            body: "internal".to_string(),
        })]);
        let client = EmbeddingClient::with_api(test_config(), api.clone()).unwrap();

        let err = client.embed_batch(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbedError::Api { status: 500, .. }));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_fatal_without_retry() {
        let api = ScriptedApi::new(vec![Ok(vectors_of(1, 64))]);
        let client = EmbeddingClient::with_api(test_config(), api.clone()).unwrap();

        let err = client.embed_batch(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(
            err,
            EmbedError::DimensionMismatch {
                expected: 128,
                actual: 64
            }
        ));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn empty_input_makes_no_network_call() {
        let api = ScriptedApi::new(vec![]);
        let client = EmbeddingClient::with_api(test_config(), api.clone()).unwrap();

        let result = client.embed_batch(&[]).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_before_any_call() {
        let api = ScriptedApi::new(vec![]);
        let client = EmbeddingClient::with_api(test_config(), api.clone()).unwrap();

        let batch: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let err = client.embed_batch(&batch).await.unwrap_err();
        assert!(matches!(
            err,
            EmbedError::BatchTooLarge {
                actual: 5,
                limit: 4
            }
        ));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn embed_single_is_a_one_element_batch() {
        let api = ScriptedApi::new(vec![Ok(vectors_of(1, 128))]);
        let client = EmbeddingClient::with_api(test_config(), api.clone()).unwrap();

        let vector = client.embed_single("hello").await.unwrap();
        assert_eq!(vector.len(), 128);
        assert_eq!(api.calls(), 1);
    }

    #[test]
    fn unknown_provider_is_rejected_at_construction() {
        let config = EmbeddingConfig {
            model: "acme/embedder-9000".to_string(),
            api_key: "key".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            EmbeddingClient::new(config),
            Err(EmbedError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn missing_api_key_is_rejected_at_construction() {
        let config = EmbeddingConfig::default();
        assert!(matches!(
            EmbeddingClient::new(config),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }
}
