//! Review tasks and decisions for human checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status of a review task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewTaskStatus {
    /// Waiting for a reviewer to pick the task up.
    Pending,
    /// A reviewer is looking at it.
    InReview,
    /// Approved; terminal.
    Approved,
    /// Rejected; terminal.
    Rejected,
    /// Changes requested; terminal.
    ChangesRequested,
}

impl ReviewTaskStatus {
    /// Returns true if the task can still be acted on.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Pending | Self::InReview)
    }
}

impl fmt::Display for ReviewTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::ChangesRequested => "changes_requested",
        };
        write!(f, "{name}")
    }
}

/// Gates progression past a checkpoint stage.
///
/// At most one actionable task may exist per (item, checkpoint); the gate
/// returns the existing task rather than creating a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewTask {
    /// Unique task id.
    pub id: Uuid,
    /// The item under review.
    pub item_id: Uuid,
    /// Checkpoint name (also the gate stage's name).
    pub checkpoint: String,
    /// Task status.
    pub status: ReviewTaskStatus,
    /// Digest of the reviewed artifact as of task creation. Used to detect
    /// that an approval refers to a since-regenerated artifact.
    pub artifact_hash: String,
    /// Paths of the artifacts put in front of the reviewer.
    pub artifact_paths: Vec<String>,
    /// Optional reference to a rendered diff for the reviewer.
    pub diff_ref: Option<String>,
    /// Notes left by the reviewer.
    pub reviewer_notes: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the task reached a terminal status.
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewTask {
    /// Creates a pending task for a checkpoint.
    #[must_use]
    pub fn new(
        item_id: Uuid,
        checkpoint: impl Into<String>,
        artifact_hash: impl Into<String>,
        artifact_paths: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            checkpoint: checkpoint.into(),
            status: ReviewTaskStatus::Pending,
            artifact_hash: artifact_hash.into(),
            artifact_paths,
            diff_ref: None,
            reviewer_notes: None,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    /// Sets the diff reference.
    #[must_use]
    pub fn with_diff_ref(mut self, diff_ref: impl Into<String>) -> Self {
        self.diff_ref = Some(diff_ref.into());
        self
    }
}

/// The action a reviewer took on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    /// Approved the artifact.
    Approve,
    /// Rejected it outright.
    Reject,
    /// Asked the producing stage to redo it with feedback.
    RequestChanges,
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
            Self::RequestChanges => write!(f, "request_changes"),
        }
    }
}

/// Immutable audit record of one action taken on a review task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    /// Unique decision id.
    pub id: Uuid,
    /// The task acted on.
    pub task_id: Uuid,
    /// What the reviewer did.
    pub action: ReviewAction,
    /// Reviewer notes, mandatory for `RequestChanges`.
    pub notes: Option<String>,
    /// When the action was taken.
    pub decided_at: DateTime<Utc>,
}

impl ReviewDecision {
    /// Records a decision against a task.
    #[must_use]
    pub fn new(task_id: Uuid, action: ReviewAction, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            action,
            notes,
            decided_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actionable_statuses() {
        assert!(ReviewTaskStatus::Pending.is_actionable());
        assert!(ReviewTaskStatus::InReview.is_actionable());
        assert!(!ReviewTaskStatus::Approved.is_actionable());
        assert!(!ReviewTaskStatus::Rejected.is_actionable());
        assert!(!ReviewTaskStatus::ChangesRequested.is_actionable());
    }

    #[test]
    fn new_task_is_pending() {
        let task = ReviewTask::new(
            Uuid::new_v4(),
            "script_review",
            "abc123",
            vec!["ep1/script.txt".to_string()],
        );

        assert_eq!(task.status, ReviewTaskStatus::Pending);
        assert!(task.reviewed_at.is_none());
        assert_eq!(task.artifact_hash, "abc123");
    }

    #[test]
    fn decision_serialization() {
        let decision = ReviewDecision::new(
            Uuid::new_v4(),
            ReviewAction::RequestChanges,
            Some("tone is off in the second act".to_string()),
        );

        let json = serde_json::to_string(&decision).expect("serialize");
        assert!(json.contains("request_changes"));
    }
}
