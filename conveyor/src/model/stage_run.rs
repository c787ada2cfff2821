//! Stage run history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of one stage execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRunStatus {
    /// Execution in progress.
    Running,
    /// Finished cleanly.
    Success,
    /// Finished with an error.
    Failed,
}

impl fmt::Display for StageRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One execution attempt of one stage for one item.
///
/// Runs are append-only: a record is immutable once terminal, and an item
/// accumulates many of them over its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRun {
    /// Unique run id.
    pub id: Uuid,
    /// The item being processed.
    pub item_id: Uuid,
    /// Stage name.
    pub stage: String,
    /// Executor pass this run belongs to.
    pub pass_id: Uuid,
    /// Run status.
    pub status: StageRunStatus,
    /// Monetary cost of the external call, in USD.
    pub cost_usd: f64,
    /// Tokens consumed by the collaborator, if it reports them.
    pub input_tokens: u64,
    /// Tokens produced by the collaborator, if it reports them.
    pub output_tokens: u64,
    /// Error text for failed runs.
    pub error: Option<String>,
    /// When execution began.
    pub started_at: DateTime<Utc>,
    /// When execution finished; `None` while running.
    pub finished_at: Option<DateTime<Utc>>,
}

impl StageRun {
    /// Creates a running record for a stage that is about to execute.
    #[must_use]
    pub fn begin(item_id: Uuid, stage: impl Into<String>, pass_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            stage: stage.into(),
            pass_id,
            status: StageRunStatus::Running,
            cost_usd: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Marks the run successful with usage accounting.
    #[must_use]
    pub fn succeed(mut self, cost_usd: f64, input_tokens: u64, output_tokens: u64) -> Self {
        self.status = StageRunStatus::Success;
        self.cost_usd = cost_usd;
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self.finished_at = Some(Utc::now());
        self
    }

    /// Marks the run failed with an error description.
    #[must_use]
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = StageRunStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        self
    }
}
