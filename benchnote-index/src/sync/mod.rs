//! Build state and sync planning.
//!
//! A build record, written after every successful sync, plus a
//! secret-free fingerprint of the index-relevant configuration is all
//! the planner needs to decide whether the next run can skip, update
//! incrementally, or must rebuild. The decision function is pure: time
//! is passed in, I/O stays in the record load/store helpers and the
//! [`engine`].

use crate::config::AppConfig;
use crate::notebook::{NotebookEntry, parse_timestamp};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod engine;

pub use engine::{SyncEngine, SyncOptions, SyncReport};

/// Stable hash of the configuration subset that invalidates the index.
///
/// Covers exactly: chunking parameters, embedding
/// model/version/dimensions/batch size, and index
/// backend/name/namespace/environment/url. API keys and all other
/// secrets are excluded: the fingerprint is persisted to disk and may
/// end up in logs.
pub fn config_fingerprint(config: &AppConfig) -> String {
    // Keys are written in sorted order so the serialized form is
    // deterministic regardless of serializer map behavior.
    let subset = serde_json::json!({
        "chunking": {
            "chunk_size": config.chunking.chunk_size,
            "overlap": config.chunking.overlap,
            "preserve_boundaries": config.chunking.preserve_boundaries,
            "tokenizer": config.chunking.tokenizer,
        },
        "embedding": {
            "batch_size": config.embedding.batch_size,
            "dimensions": config.embedding.dimensions,
            "model": config.embedding.model,
            "version": config.embedding.version,
        },
        "index": {
            "backend": config.index.backend.as_str(),
            "environment": config.index.environment,
            "index_name": config.index.index_name,
            "namespace": config.index.namespace,
            "url": config.index.url,
        },
    });
    hex::encode(blake3::hash(subset.to_string().as_bytes()).as_bytes())
}

/// Metadata describing the last successful index build.
///
/// Persisted as a single JSON document at a well-known path and
/// overwritten, not appended, on each successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub built_at: DateTime<Utc>,
    pub embedding_version: String,
    pub config_fingerprint: String,
    pub backend: String,
    pub index_name: String,
    pub namespace: String,
}

/// Load the build record, tolerating absence and corruption.
///
/// Any read or parse failure yields `None`: "no record" forces a
/// rebuild, which is always safe, whereas crashing on a torn file would
/// wedge the sync entirely.
pub async fn load_build_record(path: impl AsRef<Path>) -> Option<BuildRecord> {
    let path = path.as_ref();
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no build record");
            return None;
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "build record unreadable, treating as absent"
            );
            None
        }
    }
}

/// Persist the build record, creating parent directories as needed.
pub async fn store_build_record(path: impl AsRef<Path>, record: &BuildRecord) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let raw = serde_json::to_vec_pretty(record).context("failed to serialize build record")?;
    tokio::fs::write(path, raw)
        .await
        .with_context(|| format!("failed to write build record {}", path.display()))?;
    Ok(())
}

/// What a sync run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Skip,
    Incremental,
    Rebuild,
}

/// Why the planner chose its action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    Force,
    NoRecord,
    ConfigChanged,
    EmbeddingChanged,
    Stale,
    UpToDate,
}

/// Pure output of the planner; carries no mutable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncDecision {
    pub action: SyncAction,
    pub reason: SyncReason,
    /// When the index was last built; `None` only when no prior record
    /// exists.
    pub built_at: Option<DateTime<Utc>>,
}

/// Decide how much work the next sync run requires.
///
/// Precedence: force, then missing record, then configuration drift,
/// then embedding-version drift, then staleness, then skip.
pub fn plan_sync(
    record: Option<&BuildRecord>,
    current_fingerprint: &str,
    embedding_version: &str,
    force: bool,
    max_age_hours: Option<i64>,
    now: DateTime<Utc>,
) -> SyncDecision {
    let built_at = record.map(|r| r.built_at);
    if force {
        return SyncDecision {
            action: SyncAction::Rebuild,
            reason: SyncReason::Force,
            built_at,
        };
    }
    let Some(record) = record else {
        return SyncDecision {
            action: SyncAction::Rebuild,
            reason: SyncReason::NoRecord,
            built_at: None,
        };
    };
    if record.config_fingerprint != current_fingerprint {
        return SyncDecision {
            action: SyncAction::Rebuild,
            reason: SyncReason::ConfigChanged,
            built_at,
        };
    }
    if record.embedding_version != embedding_version {
        return SyncDecision {
            action: SyncAction::Rebuild,
            reason: SyncReason::EmbeddingChanged,
            built_at,
        };
    }
    if let Some(hours) = max_age_hours {
        if now - record.built_at > Duration::hours(hours) {
            return SyncDecision {
                action: SyncAction::Incremental,
                reason: SyncReason::Stale,
                built_at,
            };
        }
    }
    SyncDecision {
        action: SyncAction::Skip,
        reason: SyncReason::UpToDate,
        built_at,
    }
}

/// Select the entries an incremental run must re-index.
///
/// An entry qualifies only when its `updated_at` or `created_at` stamp
/// parses and is strictly later than `built_after`. Entries with
/// missing or unparseable stamps are excluded and logged: re-embedding
/// them on every incremental run would be wasted work, and a full
/// rebuild still picks them up.
pub fn select_incremental_entries<'a>(
    entries: &'a [NotebookEntry],
    built_after: DateTime<Utc>,
) -> Vec<&'a NotebookEntry> {
    entries
        .iter()
        .filter(|entry| {
            let changed = [entry.updated_at.as_deref(), entry.created_at.as_deref()]
                .into_iter()
                .flatten()
                .filter_map(parse_timestamp)
                .any(|stamp| stamp > built_after);
            if !changed && entry.updated_at.is_none() && entry.created_at.is_none() {
                tracing::warn!(entry_id = %entry.id, "entry has no timestamps, excluded from incremental run");
            }
            changed
        })
        .collect()
}
