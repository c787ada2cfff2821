//! In-memory store implementations.
//!
//! Used by tests and single-process deployments. A persistent backend only
//! needs to satisfy the traits in the parent module; the orchestration core
//! never sees the difference.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::model::{Item, PipelineReport, ReviewDecision, ReviewTask, StageRun};

use super::{ItemStore, ReportStore, ReviewStore, StageRunStore};

/// In-memory item store with compare-and-swap updates.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    items: Mutex<HashMap<Uuid, Item>>,
}

impl InMemoryItemStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn get(&self, id: Uuid) -> Option<Item> {
        self.items.lock().get(&id).cloned()
    }

    async fn insert(&self, item: Item) {
        self.items.lock().insert(item.id, item);
    }

    async fn update(&self, item: &Item) -> Result<Item, PipelineError> {
        let mut items = self.items.lock();
        let stored = items
            .get(&item.id)
            .ok_or(PipelineError::ItemNotFound { item_id: item.id })?;

        if stored.version != item.version {
            return Err(PipelineError::Conflict {
                item_id: item.id,
                expected: item.version,
                found: stored.version,
            });
        }

        let mut updated = item.clone();
        updated.version += 1;
        updated.updated_at = Utc::now();
        items.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn list(&self) -> Vec<Item> {
        self.items.lock().values().cloned().collect()
    }
}

/// In-memory append-only stage run store.
#[derive(Debug, Default)]
pub struct InMemoryStageRunStore {
    runs: Mutex<Vec<StageRun>>,
}

impl InMemoryStageRunStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StageRunStore for InMemoryStageRunStore {
    async fn append(&self, run: StageRun) {
        self.runs.lock().push(run);
    }

    async fn for_item(&self, item_id: Uuid) -> Vec<StageRun> {
        self.runs
            .lock()
            .iter()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect()
    }

    async fn total_cost(&self, item_id: Uuid) -> f64 {
        self.runs
            .lock()
            .iter()
            .filter(|r| r.item_id == item_id)
            .map(|r| r.cost_usd)
            .sum()
    }
}

/// In-memory review store.
#[derive(Debug, Default)]
pub struct InMemoryReviewStore {
    tasks: Mutex<Vec<ReviewTask>>,
    decisions: Mutex<Vec<ReviewDecision>>,
}

impl InMemoryReviewStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewStore for InMemoryReviewStore {
    async fn insert_task(&self, task: ReviewTask) {
        self.tasks.lock().push(task);
    }

    async fn get_task(&self, id: Uuid) -> Option<ReviewTask> {
        self.tasks.lock().iter().find(|t| t.id == id).cloned()
    }

    async fn update_task(&self, task: &ReviewTask) {
        let mut tasks = self.tasks.lock();
        if let Some(slot) = tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task.clone();
        }
    }

    async fn actionable_task(&self, item_id: Uuid, checkpoint: &str) -> Option<ReviewTask> {
        self.tasks
            .lock()
            .iter()
            .find(|t| {
                t.item_id == item_id && t.checkpoint == checkpoint && t.status.is_actionable()
            })
            .cloned()
    }

    async fn latest_task(&self, item_id: Uuid, checkpoint: &str) -> Option<ReviewTask> {
        self.tasks
            .lock()
            .iter()
            .filter(|t| t.item_id == item_id && t.checkpoint == checkpoint)
            .max_by_key(|t| t.created_at)
            .cloned()
    }

    async fn has_actionable(&self, item_id: Uuid) -> bool {
        self.tasks
            .lock()
            .iter()
            .any(|t| t.item_id == item_id && t.status.is_actionable())
    }

    async fn record_decision(&self, decision: ReviewDecision) {
        self.decisions.lock().push(decision);
    }

    async fn decisions_for(&self, task_id: Uuid) -> Vec<ReviewDecision> {
        self.decisions
            .lock()
            .iter()
            .filter(|d| d.task_id == task_id)
            .cloned()
            .collect()
    }
}

/// In-memory append-only report store.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: Mutex<Vec<PipelineReport>>,
}

impl InMemoryReportStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn append(&self, report: PipelineReport) {
        self.reports.lock().push(report);
    }

    async fn for_item(&self, item_id: Uuid) -> Vec<PipelineReport> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect()
    }
}
