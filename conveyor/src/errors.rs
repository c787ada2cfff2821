//! Error types for the conveyor orchestration core.
//!
//! The taxonomy separates operator mistakes (`Validation`, `NotActionable`,
//! `NotFailed`) from runtime halting conditions (`Collaborator`,
//! `CostLimitExceeded`, `InputNotFound`). Review-pending is deliberately
//! absent here: a gate waiting on a human is a normal stage outcome, not an
//! error (see [`crate::stages::StageOutcome`]).

use thiserror::Error;
use uuid::Uuid;

use crate::model::ReviewTaskStatus;

/// The main error type for conveyor operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A request was rejected before any side effect occurred.
    #[error("Validation error: {message}")]
    Validation {
        /// The error message.
        message: String,
    },

    /// The referenced item does not exist.
    #[error("Item not found: {item_id}")]
    ItemNotFound {
        /// The missing item id.
        item_id: Uuid,
    },

    /// A required upstream artifact is missing.
    #[error("Input not found for stage '{stage}': missing artifact '{artifact}'")]
    InputNotFound {
        /// The stage that required the artifact.
        stage: String,
        /// The artifact name that could not be resolved.
        artifact: String,
    },

    /// An external collaborator call failed.
    #[error("Collaborator failure in stage '{stage}': {reason}")]
    Collaborator {
        /// The stage whose collaborator failed.
        stage: String,
        /// The underlying failure description.
        reason: String,
    },

    /// The per-item cost ceiling would be exceeded by the next call.
    #[error(
        "Cost limit exceeded for item {item_id}: \
         ${spent_usd:.4} spent + ${estimated_usd:.4} estimated > ${ceiling_usd:.4} ceiling"
    )]
    CostLimitExceeded {
        /// The item whose budget is exhausted.
        item_id: Uuid,
        /// Total cost already recorded against the item.
        spent_usd: f64,
        /// Estimated cost of the refused call.
        estimated_usd: f64,
        /// The configured per-item ceiling.
        ceiling_usd: f64,
    },

    /// An action was taken on a review task that is no longer actionable.
    #[error("Review task {task_id} is not actionable (status: {status})")]
    NotActionable {
        /// The task id.
        task_id: Uuid,
        /// The task's current status.
        status: ReviewTaskStatus,
    },

    /// Reviewer notes are mandatory for a changes-requested decision.
    #[error("Reviewer notes are required when requesting changes")]
    NotesRequired,

    /// Retry was requested for an item that has not failed.
    #[error("Item {item_id} is not in a failed state")]
    NotFailed {
        /// The item id.
        item_id: Uuid,
    },

    /// A compare-and-swap update lost to a concurrent writer.
    #[error("Conflicting update for item {item_id}: expected version {expected}, found {found}")]
    Conflict {
        /// The item id.
        item_id: Uuid,
        /// The version the writer expected.
        expected: u64,
        /// The version actually stored.
        found: u64,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a collaborator failure error.
    #[must_use]
    pub fn collaborator(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Collaborator {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Creates an input-not-found error.
    #[must_use]
    pub fn input_not_found(stage: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self::InputNotFound {
            stage: stage.into(),
            artifact: artifact.into(),
        }
    }

    /// Returns true if this error indicates a budget problem rather than a
    /// service outage. Operators triage the two differently.
    #[must_use]
    pub fn is_cost_limit(&self) -> bool {
        matches!(self, Self::CostLimitExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_limit_message_carries_amounts() {
        let err = PipelineError::CostLimitExceeded {
            item_id: Uuid::nil(),
            spent_usd: 0.02,
            estimated_usd: 0.03,
            ceiling_usd: 0.04,
        };

        let message = err.to_string();
        assert!(message.contains("$0.0200"));
        assert!(message.contains("$0.0300"));
        assert!(message.contains("$0.0400"));
        assert!(err.is_cost_limit());
    }

    #[test]
    fn collaborator_error_names_stage() {
        let err = PipelineError::collaborator("transcribe", "service unavailable");
        assert!(err.to_string().contains("transcribe"));
        assert!(!err.is_cost_limit());
    }

    #[test]
    fn validation_error_from_helper() {
        let err = PipelineError::validation("wrong status");
        assert!(matches!(err, PipelineError::Validation { .. }));
    }
}
