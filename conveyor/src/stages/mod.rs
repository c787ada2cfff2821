//! The stage contract.
//!
//! Every pipeline step, content-producing or checkpoint, satisfies
//! [`Stage`]. The executor only ever talks to this trait; what a stage does
//! internally (idempotency gating, review gating) is its own business.

mod content;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use uuid::Uuid;

use crate::errors::PipelineError;
use crate::model::{Item, ItemStatus};

pub use content::{Collaborator, CollaboratorError, ContentStage, ProduceRequest, Production};

/// Options honored by every stage implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageOptions {
    /// Bypass idempotency and re-run unconditionally.
    pub force: bool,
    /// Produce a placeholder without charging cost or calling the live
    /// external service; no state is committed.
    pub dry_run: bool,
    /// Executor pass to stamp on stage run records; standalone invocations
    /// leave it unset and get a fresh one.
    pub pass_id: Option<Uuid>,
}

/// The result of a stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// True when idempotency decided no work was needed.
    pub skipped: bool,
    /// Cost of the execution in USD; zero for skips.
    pub cost_usd: f64,
    /// Paths of the artifacts this stage accounts for.
    pub output_paths: Vec<String>,
    /// Human-readable summary.
    pub detail: String,
}

impl StageResult {
    /// Builds a skipped result.
    #[must_use]
    pub fn skipped(detail: impl Into<String>, output_paths: Vec<String>) -> Self {
        Self {
            skipped: true,
            cost_usd: 0.0,
            output_paths,
            detail: detail.into(),
        }
    }

    /// Builds a completed result.
    #[must_use]
    pub fn completed(detail: impl Into<String>, cost_usd: f64, output_paths: Vec<String>) -> Self {
        Self {
            skipped: false,
            cost_usd,
            output_paths,
            detail: detail.into(),
        }
    }
}

/// How a stage execution ended, short of an error.
///
/// Waiting on a reviewer is a value here, not an [`PipelineError`]: it halts
/// the pass gracefully and must not touch retry counters.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// The stage ran (or skipped idempotently).
    Completed(StageResult),
    /// The stage is parked behind a human decision.
    ReviewPending {
        /// The checkpoint holding the item.
        checkpoint: String,
        /// Human-readable detail.
        detail: String,
    },
}

/// One step in the fixed ordered pipeline.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// The stage name, unique within a pipeline.
    fn name(&self) -> &str;

    /// The item status this stage advances from.
    fn required_status(&self) -> ItemStatus;

    /// The item status this stage advances to on success.
    fn output_status(&self) -> ItemStatus;

    /// Executes the stage against an item.
    ///
    /// Implementations commit their own status transition and stage run
    /// record on success; the executor owns failure bookkeeping.
    async fn execute(&self, item: &Item, opts: StageOptions)
        -> Result<StageOutcome, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_result_is_free() {
        let result = StageResult::skipped("already valid", vec!["a/script.txt".to_string()]);
        assert!(result.skipped);
        assert_eq!(result.cost_usd, 0.0);
        assert_eq!(result.output_paths.len(), 1);
    }

    #[test]
    fn completed_result_carries_cost() {
        let result = StageResult::completed("translated 42 lines", 0.07, vec![]);
        assert!(!result.skipped);
        assert_eq!(result.cost_usd, 0.07);
    }
}
