//! Backing-store traits and the in-memory implementations.
//!
//! Each trait covers one record family from the data model. Stages and the
//! executor hold them through [`Stores`], the dependency bundle passed in at
//! construction; nothing reaches for process-wide state.

mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::artifacts::{ArtifactStore, InMemoryArtifactStore};
use crate::errors::PipelineError;
use crate::model::{Item, PipelineReport, ReviewDecision, ReviewTask, StageRun};
use crate::provenance::{InMemoryProvenanceStore, ProvenanceStore};

pub use memory::{
    InMemoryItemStore, InMemoryReportStore, InMemoryReviewStore, InMemoryStageRunStore,
};

/// Storage for items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fetches an item by id.
    async fn get(&self, id: Uuid) -> Option<Item>;

    /// Inserts a new item.
    async fn insert(&self, item: Item);

    /// Updates an item with a compare-and-swap on its `version` field.
    ///
    /// Returns the stored copy with the version bumped, or
    /// [`PipelineError::Conflict`] when another writer got there first.
    async fn update(&self, item: &Item) -> Result<Item, PipelineError>;

    /// Lists all items.
    async fn list(&self) -> Vec<Item>;
}

/// Append-only storage for stage runs.
#[async_trait]
pub trait StageRunStore: Send + Sync {
    /// Appends a run record.
    async fn append(&self, run: StageRun);

    /// Returns all runs for an item in creation order.
    async fn for_item(&self, item_id: Uuid) -> Vec<StageRun>;

    /// Sums the recorded cost of all runs for an item.
    async fn total_cost(&self, item_id: Uuid) -> f64;
}

/// Storage for review tasks and decisions.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Inserts a task.
    async fn insert_task(&self, task: ReviewTask);

    /// Fetches a task by id.
    async fn get_task(&self, id: Uuid) -> Option<ReviewTask>;

    /// Replaces a task record.
    async fn update_task(&self, task: &ReviewTask);

    /// Returns the actionable task for an (item, checkpoint), if any.
    async fn actionable_task(&self, item_id: Uuid, checkpoint: &str) -> Option<ReviewTask>;

    /// Returns the most recently created task for an (item, checkpoint).
    async fn latest_task(&self, item_id: Uuid, checkpoint: &str) -> Option<ReviewTask>;

    /// Returns true if any checkpoint of the item has an actionable task.
    async fn has_actionable(&self, item_id: Uuid) -> bool;

    /// Appends an immutable decision record.
    async fn record_decision(&self, decision: ReviewDecision);

    /// Returns decisions for a task in creation order.
    async fn decisions_for(&self, task_id: Uuid) -> Vec<ReviewDecision>;
}

/// Append-only storage for pipeline reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Appends a report.
    async fn append(&self, report: PipelineReport);

    /// Returns all reports for an item in creation order.
    async fn for_item(&self, item_id: Uuid) -> Vec<PipelineReport>;
}

/// The dependency bundle handed to stages, the gate, and the executor.
#[derive(Clone)]
pub struct Stores {
    /// Item records.
    pub items: Arc<dyn ItemStore>,
    /// Stage run history.
    pub runs: Arc<dyn StageRunStore>,
    /// Review tasks and decisions.
    pub reviews: Arc<dyn ReviewStore>,
    /// Pipeline reports.
    pub reports: Arc<dyn ReportStore>,
    /// Provenance records and staleness markers.
    pub provenance: Arc<dyn ProvenanceStore>,
    /// Stage artifacts.
    pub artifacts: Arc<dyn ArtifactStore>,
}

impl Stores {
    /// Builds a fully in-memory bundle, the default for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            items: Arc::new(InMemoryItemStore::new()),
            runs: Arc::new(InMemoryStageRunStore::new()),
            reviews: Arc::new(InMemoryReviewStore::new()),
            reports: Arc::new(InMemoryReportStore::new()),
            provenance: Arc::new(InMemoryProvenanceStore::new()),
            artifacts: Arc::new(InMemoryArtifactStore::new()),
        }
    }

    /// Swaps in a different artifact store.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = artifacts;
        self
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
