//! Pipeline pass reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How one stage ended within a single executor pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageDisposition {
    /// Not executed (already completed, not ready, or idempotent skip).
    Skipped,
    /// Executed and succeeded.
    Success,
    /// Executed and failed; the pass halted here.
    Failed,
    /// Halted waiting on a human decision. Not a failure.
    ReviewPending,
}

impl fmt::Display for StageDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Skipped => "skipped",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::ReviewPending => "review_pending",
        };
        write!(f, "{name}")
    }
}

/// Per-stage slice of a pipeline report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name.
    pub stage: String,
    /// How the stage ended.
    pub status: StageDisposition,
    /// Wall-clock duration of the stage in milliseconds.
    pub duration_ms: u64,
    /// Human-readable detail (skip reason, collaborator summary, ...).
    pub detail: String,
    /// Error text for failed stages.
    pub error: Option<String>,
    /// Cost attributed to this stage in this pass.
    pub cost_usd: f64,
}

/// The outcome of one executor pass over one item.
///
/// Created fresh per pass and persisted append-only; never mutated after
/// [`PipelineReport::finish`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// The item processed.
    pub item_id: Uuid,
    /// Unique id of this executor pass; also stamped on stage runs.
    pub pass_id: Uuid,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// True when no stage failed. A pass halted on review is still a success.
    pub success: bool,
    /// Terminal error of the pass, if any.
    pub error: Option<String>,
    /// Sum of costs reported by successful stages in this pass.
    pub total_cost_usd: f64,
    /// Per-stage results in pipeline order.
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    /// Starts a report for a new executor pass.
    #[must_use]
    pub fn begin(item_id: Uuid) -> Self {
        Self {
            item_id,
            pass_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            success: false,
            error: None,
            total_cost_usd: 0.0,
            stages: Vec::new(),
        }
    }

    /// Appends a stage result.
    pub fn push_stage(&mut self, stage: StageReport) {
        if stage.status == StageDisposition::Success {
            self.total_cost_usd += stage.cost_usd;
        }
        self.stages.push(stage);
    }

    /// Seals the report.
    pub fn finish(&mut self, success: bool, error: Option<String>) {
        self.success = success;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }

    /// Returns true if the pass stopped at a review gate.
    #[must_use]
    pub fn is_review_pending(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.status == StageDisposition::ReviewPending)
    }
}
