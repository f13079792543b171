//! Layered configuration.
//!
//! One TOML document with `chunking`, `embedding`, `index`, and
//! `incremental_updates` sections. Secrets never appear in the file:
//! API keys are injected from the environment at load time and the
//! config types skip them during serialization, which keeps them out of
//! fingerprints and logs by construction.

use anyhow::{Context, Result, bail};
use benchnote_chunk::ChunkingConfig;
use benchnote_embed::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the embedding API key.
pub const EMBED_API_KEY_ENV: &str = "BENCHNOTE_EMBED_API_KEY";
/// Environment variable holding the vector index API key.
pub const INDEX_API_KEY_ENV: &str = "BENCHNOTE_INDEX_API_KEY";

/// Known vector index backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackendKind {
    Pinecone,
    Memory,
}

impl IndexBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinecone => "pinecone",
            Self::Memory => "memory",
        }
    }
}

/// Vector index connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: IndexBackendKind,
    pub index_name: String,
    /// Multi-tenancy partition inside the index.
    pub namespace: String,
    /// Hosting environment/region tag, e.g. `us-east-1`.
    pub environment: String,
    /// Data-plane URL of the index host. Unused by the memory backend.
    pub url: String,
    /// Secret API key; excluded from serialization and fingerprints.
    #[serde(skip)]
    pub api_key: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackendKind::Memory,
            index_name: "benchnote".to_string(),
            namespace: "default".to_string(),
            environment: "us-east-1".to_string(),
            url: String::new(),
            api_key: String::new(),
        }
    }
}

impl IndexSettings {
    pub fn validate(&self) -> Result<()> {
        if self.index_name.trim().is_empty() {
            bail!("index_name must not be empty");
        }
        if self.namespace.trim().is_empty() {
            bail!("namespace must not be empty");
        }
        if self.backend == IndexBackendKind::Pinecone && self.url.trim().is_empty() {
            bail!("the pinecone backend requires an index url");
        }
        Ok(())
    }
}

/// Scheduled incremental update settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalSettings {
    pub enabled: bool,
    /// Five-field cron expression evaluated by the surrounding scheduler.
    pub schedule: String,
    /// Pages handled per scheduled run.
    pub batch_size: usize,
    /// Location of the persisted build record.
    pub build_record_path: PathBuf,
}

impl Default for IncrementalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: "0 3 * * *".to_string(),
            batch_size: 50,
            build_record_path: PathBuf::from(".benchnote/build_record.json"),
        }
    }
}

impl IncrementalSettings {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("incremental batch_size must be positive");
        }
        if self.schedule.split_whitespace().count() != 5 {
            bail!(
                "schedule '{}' is not a five-field cron expression",
                self.schedule
            );
        }
        if self.build_record_path.as_os_str().is_empty() {
            bail!("build_record_path must not be empty");
        }
        Ok(())
    }
}

/// Root configuration object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexSettings,
    pub incremental_updates: IncrementalSettings,
}

impl AppConfig {
    /// Load configuration from a TOML file, inject secrets from the
    /// environment, and validate every section.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_secrets();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string. Does not read the
    /// environment or validate; [`load`](Self::load) does both.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("failed to parse configuration")
    }

    /// Fill API keys from the environment when unset.
    pub fn apply_env_secrets(&mut self) {
        if self.embedding.api_key.is_empty() {
            if let Ok(key) = std::env::var(EMBED_API_KEY_ENV) {
                self.embedding.api_key = key;
            }
        }
        if self.index.api_key.is_empty() {
            if let Ok(key) = std::env::var(INDEX_API_KEY_ENV) {
                self.index.api_key = key;
            }
        }
    }

    /// Validate every section, failing fast on the first violation.
    pub fn validate(&self) -> Result<()> {
        self.chunking
            .validate()
            .map_err(anyhow::Error::from)
            .context("invalid [chunking] section")?;
        self.embedding
            .validate()
            .map_err(anyhow::Error::from)
            .context("invalid [embedding] section")?;
        self.index.validate().context("invalid [index] section")?;
        self.incremental_updates
            .validate()
            .context("invalid [incremental_updates] section")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [chunking]
        chunk_size = 400
        overlap = 50

        [embedding]
        model = "openai/text-embedding-3-small"
        version = "2025-03"
        dimensions = 1536
        batch_size = 96

        [index]
        backend = "pinecone"
        index_name = "eln-search"
        namespace = "lab-7"
        environment = "us-east-1"
        url = "https://eln-search-abc123.svc.us-east-1.pinecone.io"

        [incremental_updates]
        enabled = true
        schedule = "30 2 * * *"
        batch_size = 25
        build_record_path = "/var/lib/benchnote/build_record.json"
    "#;

    #[test]
    fn sample_config_parses_and_validates() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.chunking.tokenizer, "cl100k_base");
        assert_eq!(config.embedding.version, "2025-03");
        assert_eq!(config.index.backend, IndexBackendKind::Pinecone);
        assert_eq!(config.index.namespace, "lab-7");
        assert_eq!(config.incremental_updates.batch_size, 25);
        config.validate().unwrap();
    }

    #[test]
    fn defaults_validate() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn api_keys_cannot_come_from_the_file() {
        let raw = r#"
            [embedding]
            api_key = "sk-leaked"
        "#;
        // serde(skip) makes the field unknown to the deserializer; the
        // value from the file is ignored.
        let config = AppConfig::from_toml_str(raw);
        assert!(config.is_err() || config.unwrap().embedding.api_key.is_empty());
    }

    #[test]
    fn pinecone_backend_requires_a_url() {
        let raw = r#"
            [index]
            backend = "pinecone"
        "#;
        let config = AppConfig::from_toml_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_schedule_is_rejected() {
        let raw = r#"
            [incremental_updates]
            schedule = "hourly"
        "#;
        let config = AppConfig::from_toml_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_chunking_is_rejected() {
        let raw = r#"
            [chunking]
            chunk_size = 100
            overlap = 100
        "#;
        let config = AppConfig::from_toml_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn serialized_config_never_contains_secrets() {
        let mut config = AppConfig::default();
        config.embedding.api_key = "sk-embed-secret".to_string();
        config.index.api_key = "pc-index-secret".to_string();
        let serialized = toml::to_string(&config).unwrap();
        assert!(!serialized.contains("secret"));
        assert!(!serialized.contains("api_key"));
    }
}
