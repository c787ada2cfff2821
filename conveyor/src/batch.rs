//! Backlog selection and failure recovery.
//!
//! The batch runner is the single worker in front of the executor: items
//! are selected, ordered by publish date, and processed one at a time, so
//! at most one executor pass mutates any item at any moment.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::model::{Item, PipelineReport};
use crate::pipeline::{ExecutorConfig, PipelineExecutor};
use crate::store::Stores;

/// Narrowing filters for a batch pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchFilter {
    /// Process at most this many items.
    pub limit: Option<usize>,
    /// Only items intended to publish before this instant.
    pub published_before: Option<DateTime<Utc>>,
}

/// Selects backlog items and drives the executor over them.
#[derive(Debug)]
pub struct BatchRunner {
    executor: Arc<PipelineExecutor>,
    stores: Stores,
}

impl BatchRunner {
    /// Creates a batch runner.
    #[must_use]
    pub fn new(executor: Arc<PipelineExecutor>, stores: Stores) -> Self {
        Self { executor, stores }
    }

    /// Returns true if the item belongs in a pending batch: in flight, not
    /// failed (failed items need an explicit retry), and not waiting on a
    /// reviewer.
    async fn in_flight(&self, item: &Item) -> bool {
        !item.status.is_terminal()
            && !item.is_failed()
            && !self.stores.reviews.has_actionable(item.id).await
    }

    /// Runs one executor pass over every selected backlog item.
    ///
    /// One item's failure never aborts the rest of the batch; its report
    /// carries the error.
    pub async fn run_pending(
        &self,
        filter: BatchFilter,
        config: ExecutorConfig,
    ) -> Vec<PipelineReport> {
        let mut selected = Vec::new();
        for item in self.stores.items.list().await {
            if let Some(before) = filter.published_before {
                if item.publish_at >= before {
                    continue;
                }
            }
            if self.in_flight(&item).await {
                selected.push(item);
            }
        }

        selected.sort_by_key(|item| item.publish_at);
        if let Some(limit) = filter.limit {
            selected.truncate(limit);
        }

        tracing::info!(count = selected.len(), "batch pass starting");

        let mut reports = Vec::with_capacity(selected.len());
        for item in selected {
            match self.executor.run(item.id, config).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    // Store-level failure for one item; the rest still run.
                    tracing::error!(item_id = %item.id, error = %err, "batch item errored");
                }
            }
        }
        reports
    }

    /// Retries a failed item from its last successful stage.
    ///
    /// The item's status is the resume point: clearing the error and
    /// re-running lets the plan resolver pick up exactly where the failed
    /// stage left off.
    pub async fn retry_failed(&self, item_id: Uuid) -> Result<PipelineReport, PipelineError> {
        let mut item = self
            .stores
            .items
            .get(item_id)
            .await
            .ok_or(PipelineError::ItemNotFound { item_id })?;

        if !item.is_failed() {
            return Err(PipelineError::NotFailed { item_id });
        }

        tracing::info!(%item_id, status = %item.status, "retrying failed item");
        item.error_message = None;
        self.stores.items.update(&item).await?;

        self.executor.run(item_id, ExecutorConfig::default()).await
    }
}
