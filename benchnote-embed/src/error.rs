//! Error types for the embedding system

use std::time::Duration;

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// The variants split along the retry policy:
///
/// - **Input errors** ([`BatchTooLarge`](Self::BatchTooLarge),
///   [`InvalidConfig`](Self::InvalidConfig)) fail before any network call.
/// - **Transient errors** ([`Timeout`](Self::Timeout),
///   [`RateLimited`](Self::RateLimited)) are retried with exponential
///   backoff up to the configured attempt count.
/// - **Contract violations** ([`DimensionMismatch`](Self::DimensionMismatch),
///   [`MalformedResponse`](Self::MalformedResponse)) are never retried:
///   repeating the call cannot fix a model/config mismatch.
/// - Everything else propagates immediately.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The batch exceeds the configured maximum size.
    #[error("batch of {actual} texts exceeds configured maximum {limit}")]
    BatchTooLarge { actual: usize, limit: usize },

    /// A returned vector did not match the configured dimension count.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The request timed out.
    #[error("embedding request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The service rejected the request with a rate-limit response.
    #[error("embedding service rate limited the request")]
    RateLimited,

    /// Any other HTTP-level failure; not retried.
    #[error("embedding request failed ({status}): {body}")]
    Api { status: u16, body: String },

    /// Transport failures below the HTTP layer.
    #[error("embedding transport error: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// All retry attempts were consumed without capturing a cause.
    #[error("embedding retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: usize },

    /// The response parsed but violated the request/response contract.
    #[error("malformed embedding response: {message}")]
    MalformedResponse { message: String },

    /// Configuration is out of range or inconsistent.
    #[error("invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// The model id names a provider with no registered implementation.
    #[error("unknown embedding provider: {name}")]
    UnknownProvider { name: String },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed response error with a custom message.
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Backoff before the next attempt, or `None` when the error is not
    /// retryable.
    ///
    /// Timeouts back off `2^attempt` seconds; rate limits back off longer,
    /// `2^(attempt + 1)` seconds, to give the limiter room to reset.
    pub fn retry_backoff(&self, attempt: usize) -> Option<Duration> {
        match self {
            Self::Timeout { .. } => Some(Duration::from_secs(1 << attempt.min(16))),
            Self::RateLimited => Some(Duration::from_secs(1 << (attempt + 1).min(16))),
            _ => None,
        }
    }
}
