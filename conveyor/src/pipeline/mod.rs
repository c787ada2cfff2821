//! Pipeline definition, planning, and execution.
//!
//! This module provides:
//! - Versioned stage lists and their validation
//! - The side-effect-free plan resolver
//! - The pass executor and its reports
//! - Per-item cost governance
//! - The concrete media pipeline catalog

mod catalog;
mod cost;
mod definition;
mod executor;
mod plan;

pub use catalog::{
    definition_v1, definition_v2, review_gate, standard_pipelines, MediaCollaborators, ART,
    RECEIPT, RELEASE_REVIEW, SCRIPT, SCRIPT_REVIEW, SOURCE_MEDIA, TRANSCRIPT, VIDEO, VOICE,
};
pub use cost::CostLedger;
pub use definition::{PipelineDefinition, PipelineSet};
pub use executor::{ExecutorConfig, PipelineExecutor};
pub use plan::{resolve, Plan, PlanAction, PlanEntry};
