//! # benchnote-embed
//!
//! Batched text embedding over remote inference APIs, with the retry
//! discipline the indexing pipeline depends on. Designed for async
//! operation with a narrow seam between policy and transport:
//!
//! - [`EmbeddingClient`] owns the batch contract, dimension validation,
//!   and retry/backoff policy.
//! - [`EmbeddingApi`] is one network round trip with no policy; concrete
//!   implementations speak the OpenAI-compatible and Qdrant Cloud
//!   Inference wire formats.
//!
//! The provider is selected once, at construction, from the
//! provider-qualified model id (`openai/text-embedding-3-small`), so no
//! call site ever matches on provider strings.
//!
//! ## Quick Start
//!
//! ```no_run
//! use benchnote_embed::{EmbeddingClient, EmbeddingConfig};
//!
//! # async fn example() -> benchnote_embed::Result<()> {
//! let mut config = EmbeddingConfig::default();
//! config.api_key = std::env::var("BENCHNOTE_EMBED_API_KEY").unwrap_or_default();
//!
//! let client = EmbeddingClient::new(config)?;
//! let vectors = client
//!     .embed_batch(&["Seeded culture at 09:30".to_string()])
//!     .await?;
//! assert_eq!(vectors[0].len(), client.dimensions());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod openai;
pub mod provider;
pub mod qdrant;

pub use config::EmbeddingConfig;
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingApi, EmbeddingClient};
