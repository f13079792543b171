//! benchnote-index: semantic indexing for electronic lab notebook content
//!
//! This crate turns notebook pages into a searchable vector index and
//! decides, run over run, how much work that requires. The pipeline is
//! one-directional:
//!
//! ```text
//! Pages → indexable text → chunks → embedded chunks → vector index
//!   ↑                                                     ↑
//! EntryProvider        NotebookIndexer            VectorIndex backend
//!                            ↑
//!                  SyncEngine ← BuildRecord + plan_sync
//! ```
//!
//! ## Key Modules
//!
//! - **[`notebook`]**: Entry/page models and the collaborator traits the
//!   external notebook client and result consumers plug into
//! - **[`chunk_record`]**: Embedded chunk identity, metadata, and
//!   fail-fast validation
//! - **[`storage`]**: Backend-agnostic vector index trait with hosted
//!   (Pinecone) and in-memory implementations
//! - **[`indexer`]**: Page orchestration from extraction through upsert
//! - **[`sync`]**: Configuration fingerprinting, build records, and the
//!   skip/incremental/rebuild planner
//! - **[`config`]**: Layered TOML configuration with env-injected secrets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use benchnote_index::config::AppConfig;
//! use benchnote_index::indexer::NotebookIndexer;
//! use benchnote_index::storage::open_index;
//! use benchnote_embed::EmbeddingClient;
//! use benchnote_chunk::Chunker;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = AppConfig::load("benchnote.toml")?;
//! let index = open_index(&config.index)?;
//! let indexer = NotebookIndexer::new(
//!     Chunker::new(config.chunking.clone())?,
//!     EmbeddingClient::new(config.embedding.clone())?,
//!     index.into(),
//! );
//! # Ok(())
//! # }
//! ```

pub mod chunk_record;
pub mod config;
pub mod indexer;
pub mod notebook;
pub mod storage;
pub mod sync;
