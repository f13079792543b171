//! Sync execution.
//!
//! Plans a run, optionally stops at the decision (dry run), executes the
//! rebuild or incremental pass page by page, and overwrites the build
//! record on success. Pages are processed sequentially; concurrent sync
//! runs against the same index and namespace are not guarded against
//! each other.

use super::{
    BuildRecord, SyncAction, SyncDecision, config_fingerprint, load_build_record, plan_sync,
    select_incremental_entries, store_build_record,
};
use crate::config::AppConfig;
use crate::indexer::NotebookIndexer;
use crate::notebook::{EntryProvider, NotebookPage};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Options for one sync invocation.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Rebuild regardless of the build record.
    pub force: bool,
    /// Compute and return the decision without any side effects.
    pub dry_run: bool,
    /// Age in hours beyond which a matching index is refreshed
    /// incrementally.
    pub max_age_hours: Option<i64>,
    /// Restrict the run to one notebook.
    pub notebook_id: Option<String>,
}

/// Summary of a sync run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub decision: SyncDecision,
    pub pages_processed: usize,
    pub chunks_indexed: usize,
    pub entries_skipped: usize,
    pub dry_run: bool,
}

impl SyncReport {
    fn decision_only(decision: SyncDecision, dry_run: bool) -> Self {
        Self {
            decision,
            pages_processed: 0,
            chunks_indexed: 0,
            entries_skipped: 0,
            dry_run,
        }
    }
}

/// Drives the sync flow against an entry provider and an indexer.
pub struct SyncEngine<P: EntryProvider> {
    provider: P,
    indexer: NotebookIndexer,
    config: AppConfig,
}

impl<P: EntryProvider> SyncEngine<P> {
    pub fn new(provider: P, indexer: NotebookIndexer, config: AppConfig) -> Self {
        Self {
            provider,
            indexer,
            config,
        }
    }

    /// The indexer this engine drives, for query-side access.
    pub fn indexer(&self) -> &NotebookIndexer {
        &self.indexer
    }

    /// Run one sync.
    pub async fn sync(&self, options: SyncOptions) -> Result<SyncReport> {
        let fingerprint = config_fingerprint(&self.config);
        let record_path = &self.config.incremental_updates.build_record_path;
        let record = load_build_record(record_path).await;
        let decision = plan_sync(
            record.as_ref(),
            &fingerprint,
            &self.config.embedding.version,
            options.force,
            options.max_age_hours,
            Utc::now(),
        );
        tracing::info!(
            action = ?decision.action,
            reason = ?decision.reason,
            dry_run = options.dry_run,
            "sync planned"
        );

        if options.dry_run || decision.action == SyncAction::Skip {
            return Ok(SyncReport::decision_only(decision, options.dry_run));
        }

        let pages = self.provider.pages(options.notebook_id.as_deref()).await?;
        let mut report = SyncReport::decision_only(decision.clone(), false);
        match decision.action {
            SyncAction::Rebuild => {
                for page in &pages {
                    self.index_one(page, &mut report).await?;
                }
            }
            SyncAction::Incremental => {
                // Stale is the only incremental reason, and it requires a
                // prior record; the planner guarantees built_at is set.
                let built_after = decision.built_at.unwrap_or(DateTime::<Utc>::MIN_UTC);
                for page in &pages {
                    let selected = select_incremental_entries(&page.entries, built_after);
                    if selected.is_empty() {
                        continue;
                    }
                    let filtered = NotebookPage {
                        entries: selected.into_iter().cloned().collect(),
                        ..page.clone()
                    };
                    self.index_one(&filtered, &mut report).await?;
                }
            }
            SyncAction::Skip => unreachable!("skip handled before side effects"),
        }

        let record = BuildRecord {
            built_at: Utc::now(),
            embedding_version: self.config.embedding.version.clone(),
            config_fingerprint: fingerprint,
            backend: self.config.index.backend.as_str().to_string(),
            index_name: self.config.index.index_name.clone(),
            namespace: self.config.index.namespace.clone(),
        };
        store_build_record(record_path, &record).await?;
        tracing::info!(
            pages = report.pages_processed,
            chunks = report.chunks_indexed,
            "sync complete"
        );
        Ok(report)
    }

    async fn index_one(&self, page: &NotebookPage, report: &mut SyncReport) -> Result<()> {
        let outcome = self.indexer.index_page(page).await?;
        report.pages_processed += 1;
        report.chunks_indexed += outcome.indexed_count;
        report.entries_skipped += outcome.skipped_count;
        Ok(())
    }
}
