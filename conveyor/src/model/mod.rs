//! Core domain model types for conveyor.
//!
//! This module contains the records the orchestration core persists:
//! - Items and their ordered status set
//! - Stage run history (append-only)
//! - Review tasks and decisions
//! - Pipeline reports

mod item;
mod report;
mod review;
mod stage_run;

pub use item::{Item, ItemStatus, PipelineVersion};
pub use report::{PipelineReport, StageDisposition, StageReport};
pub use review::{ReviewAction, ReviewDecision, ReviewTask, ReviewTaskStatus};
pub use stage_run::{StageRun, StageRunStatus};
