//! Configuration for remote embedding providers

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a remote embedding model.
///
/// The model id is provider-qualified (`provider/name`); the provider
/// prefix selects the wire implementation at client construction. The API
/// key is never serialized: it is injected from the environment by the
/// configuration layer and is deliberately absent from anything that gets
/// fingerprinted or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider-qualified model id, e.g. `openai/text-embedding-3-small`.
    pub model: String,
    /// Opaque version tag used for cache invalidation. Bump it to force
    /// re-embedding after a model change the id does not capture.
    pub version: String,
    /// Expected dimension of every returned vector.
    pub dimensions: usize,
    /// Maximum number of texts per request.
    pub batch_size: usize,
    /// Maximum request attempts per batch, transient failures included.
    pub max_retries: usize,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Base URL of the embedding endpoint.
    pub base_url: String,
    /// Secret API key; excluded from serialization and fingerprints.
    #[serde(skip)]
    pub api_key: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "openai/text-embedding-3-small".to_string(),
            version: "1".to_string(),
            dimensions: 1536,
            batch_size: 100,
            max_retries: 3,
            timeout_seconds: 30,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
        }
    }
}

impl EmbeddingConfig {
    /// Provider prefix of the model id.
    pub fn provider(&self) -> Result<&str> {
        self.split_model().map(|(provider, _)| provider)
    }

    /// Model name with the provider prefix stripped.
    pub fn model_name(&self) -> Result<&str> {
        self.split_model().map(|(_, name)| name)
    }

    fn split_model(&self) -> Result<(&str, &str)> {
        match self.model.split_once('/') {
            Some((provider, name)) if !provider.is_empty() && !name.is_empty() => {
                Ok((provider, name))
            }
            _ => Err(EmbedError::invalid_config(format!(
                "model '{}' is not provider-qualified (expected provider/name)",
                self.model
            ))),
        }
    }

    /// Validate ranges and the model id shape.
    pub fn validate(&self) -> Result<()> {
        self.split_model()?;
        if !(128..=4096).contains(&self.dimensions) {
            return Err(EmbedError::invalid_config(format!(
                "dimensions must be within 128..=4096, got {}",
                self.dimensions
            )));
        }
        if !(1..=500).contains(&self.batch_size) {
            return Err(EmbedError::invalid_config(format!(
                "batch_size must be within 1..=500, got {}",
                self.batch_size
            )));
        }
        if !(1..=10).contains(&self.max_retries) {
            return Err(EmbedError::invalid_config(format!(
                "max_retries must be within 1..=10, got {}",
                self.max_retries
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(EmbedError::invalid_config("timeout_seconds must be positive"));
        }
        if self.base_url.trim().is_empty() {
            return Err(EmbedError::invalid_config("base_url must not be empty"));
        }
        Ok(())
    }

    /// Set the API key (builder style).
    pub fn with_api_key<S: Into<String>>(self, api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            ..self
        }
    }

    /// Set the batch size (builder style).
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        EmbeddingConfig::default().validate().unwrap();
    }

    #[test]
    fn model_id_splits_into_provider_and_name() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider().unwrap(), "openai");
        assert_eq!(config.model_name().unwrap(), "text-embedding-3-small");
    }

    #[test]
    fn unqualified_model_is_rejected() {
        let config = EmbeddingConfig {
            model: "text-embedding-3-small".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let too_small = EmbeddingConfig {
            dimensions: 64,
            ..EmbeddingConfig::default()
        };
        assert!(too_small.validate().is_err());

        let oversized_batch = EmbeddingConfig {
            batch_size: 501,
            ..EmbeddingConfig::default()
        };
        assert!(oversized_batch.validate().is_err());

        let no_retries = EmbeddingConfig {
            max_retries: 0,
            ..EmbeddingConfig::default()
        };
        assert!(no_retries.validate().is_err());
    }

    #[test]
    fn api_key_never_serializes() {
        let config = EmbeddingConfig::default().with_api_key("sk-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!json.contains("api_key"));
    }
}
