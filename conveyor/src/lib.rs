//! # Conveyor
//!
//! A pipeline orchestration core for media episode production.
//!
//! Conveyor drives items (episodes) through a fixed, versioned sequence of
//! content-producing stages with support for:
//!
//! - **Status-driven resumption**: The item's status is its resume point;
//!   every pass plans from it and runs only what is left
//! - **Idempotency by provenance**: Stages skip themselves when their input
//!   hashes and template version match the recorded lineage of an existing
//!   output
//! - **Staleness cascading**: Regenerating an artifact flags its immediate
//!   successor stale, one hop per stage execution
//! - **Human review gates**: Checkpoint stages park the pipeline on a review
//!   task; rejection rolls the item back, feedback flows into the re-run
//! - **Cost governance**: A per-item spend ceiling checked before every
//!   chargeable collaborator call
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conveyor::prelude::*;
//!
//! let stores = Stores::in_memory();
//! let (pipelines, gate) = standard_pipelines(&collaborators, &stores, CostLedger::default())?;
//! let executor = PipelineExecutor::new(pipelines, stores.clone());
//!
//! let item = Item::new("Episode 1", "https://media.example/episode-1");
//! stores.items.insert(item.clone()).await;
//!
//! // Runs until done, failed, or parked on a review gate.
//! let report = executor.run(item.id, ExecutorConfig::default()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifacts;
pub mod batch;
pub mod errors;
pub mod hashing;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod provenance;
pub mod review;
pub mod stages;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifacts::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore};
    pub use crate::batch::{BatchFilter, BatchRunner};
    pub use crate::errors::PipelineError;
    pub use crate::model::{
        Item, ItemStatus, PipelineReport, PipelineVersion, ReviewAction, ReviewDecision,
        ReviewTask, ReviewTaskStatus, StageDisposition, StageReport, StageRun, StageRunStatus,
    };
    pub use crate::pipeline::{
        standard_pipelines, CostLedger, ExecutorConfig, MediaCollaborators, Plan, PlanAction,
        PipelineDefinition, PipelineExecutor, PipelineSet,
    };
    pub use crate::provenance::{ProvenanceRecord, ProvenanceStore, StalenessMarker};
    pub use crate::review::{CheckpointPolicy, CheckpointStage, ReviewGate};
    pub use crate::stages::{
        Collaborator, ContentStage, ProduceRequest, Production, Stage, StageOptions, StageOutcome,
        StageResult,
    };
    pub use crate::store::{ItemStore, ReportStore, ReviewStore, StageRunStore, Stores};
}
