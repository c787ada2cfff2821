//! The review gate: human checkpoints inside the pipeline.
//!
//! The gate is two things. As a service it owns the review surface
//! (create/approve/reject/request-changes) and the reversion side effects.
//! As a pipeline stage ([`CheckpointStage`]) it parks the executor until an
//! approval for the current artifact exists.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::hashing::content_digest;
use crate::model::{
    Item, ItemStatus, ReviewAction, ReviewDecision, ReviewTask, ReviewTaskStatus, StageRun,
};
use crate::provenance::StalenessMarker;
use crate::stages::{Stage, StageOptions, StageOutcome, StageResult};
use crate::store::Stores;

/// Per-checkpoint configuration: what is reviewed and what a rejection
/// reverts to.
#[derive(Debug, Clone)]
pub struct CheckpointPolicy {
    /// Checkpoint name, matching the gate stage's name.
    pub checkpoint: String,
    /// The artifact put in front of the reviewer.
    pub reviewed_artifact: String,
    /// Status to revert the item to on rejection or changes-requested.
    /// `None` for the pre-publish checkpoint, which parks the item for
    /// manual remediation instead.
    pub revert_to: Option<ItemStatus>,
}

/// The review surface and its transition effects.
pub struct ReviewGate {
    stores: Stores,
    policies: HashMap<String, CheckpointPolicy>,
}

impl std::fmt::Debug for ReviewGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewGate")
            .field("checkpoints", &self.policies.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ReviewGate {
    /// Creates a gate with no checkpoints registered.
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            policies: HashMap::new(),
        }
    }

    /// Registers a checkpoint policy.
    #[must_use]
    pub fn with_policy(mut self, policy: CheckpointPolicy) -> Self {
        self.policies.insert(policy.checkpoint.clone(), policy);
        self
    }

    fn policy(&self, checkpoint: &str) -> Result<&CheckpointPolicy, PipelineError> {
        self.policies
            .get(checkpoint)
            .ok_or_else(|| PipelineError::validation(format!("unknown checkpoint '{checkpoint}'")))
    }

    /// Creates a pending task for a checkpoint, or returns the existing
    /// actionable one. At most one actionable task exists per
    /// (item, checkpoint).
    pub async fn create_task(
        &self,
        item_id: Uuid,
        checkpoint: &str,
        artifact_hash: impl Into<String>,
        artifact_paths: Vec<String>,
        diff_ref: Option<String>,
    ) -> Result<ReviewTask, PipelineError> {
        self.policy(checkpoint)?;

        if let Some(existing) = self.stores.reviews.actionable_task(item_id, checkpoint).await {
            return Ok(existing);
        }

        let mut task = ReviewTask::new(item_id, checkpoint, artifact_hash, artifact_paths);
        if let Some(diff_ref) = diff_ref {
            task = task.with_diff_ref(diff_ref);
        }
        self.stores.reviews.insert_task(task.clone()).await;

        tracing::info!(%item_id, checkpoint, task_id = %task.id, "review task created");
        Ok(task)
    }

    /// Approves a task. The item is not advanced here; the executor
    /// re-checks for the approval the next time it reaches the gate.
    pub async fn approve(
        &self,
        task_id: Uuid,
        notes: Option<String>,
    ) -> Result<ReviewDecision, PipelineError> {
        let task = self.actionable(task_id).await?;
        self.finalize(task, ReviewTaskStatus::Approved, notes.clone())
            .await;
        self.decide(task_id, ReviewAction::Approve, notes).await
    }

    /// Rejects a task and reverts the item per the checkpoint policy.
    pub async fn reject(
        &self,
        task_id: Uuid,
        notes: Option<String>,
    ) -> Result<ReviewDecision, PipelineError> {
        let task = self.actionable(task_id).await?;
        let policy = self.policy(&task.checkpoint)?.clone();

        self.finalize(task.clone(), ReviewTaskStatus::Rejected, notes.clone())
            .await;
        self.revert(&task, &policy).await?;
        self.decide(task_id, ReviewAction::Reject, notes).await
    }

    /// Requests changes: reverts the item, flags the reviewed artifact stale
    /// so its producing stage re-runs, and carries the notes as feedback for
    /// that run. Notes are mandatory.
    pub async fn request_changes(
        &self,
        task_id: Uuid,
        notes: impl Into<String>,
    ) -> Result<ReviewDecision, PipelineError> {
        let notes = notes.into();
        if notes.trim().is_empty() {
            return Err(PipelineError::NotesRequired);
        }

        let task = self.actionable(task_id).await?;
        let policy = self.policy(&task.checkpoint)?.clone();

        self.finalize(
            task.clone(),
            ReviewTaskStatus::ChangesRequested,
            Some(notes.clone()),
        )
        .await;
        self.revert(&task, &policy).await?;

        self.stores
            .provenance
            .mark_stale(
                task.item_id,
                StalenessMarker::new(policy.reviewed_artifact.clone(), task.checkpoint.clone())
                    .with_reason(notes.clone()),
            )
            .await;

        self.decide(task_id, ReviewAction::RequestChanges, Some(notes))
            .await
    }

    async fn actionable(&self, task_id: Uuid) -> Result<ReviewTask, PipelineError> {
        let task = self
            .stores
            .reviews
            .get_task(task_id)
            .await
            .ok_or_else(|| PipelineError::validation(format!("review task {task_id} not found")))?;

        if !task.status.is_actionable() {
            return Err(PipelineError::NotActionable {
                task_id,
                status: task.status,
            });
        }
        Ok(task)
    }

    async fn finalize(&self, mut task: ReviewTask, status: ReviewTaskStatus, notes: Option<String>) {
        task.status = status;
        task.reviewer_notes = notes;
        task.reviewed_at = Some(Utc::now());
        self.stores.reviews.update_task(&task).await;
    }

    async fn revert(
        &self,
        task: &ReviewTask,
        policy: &CheckpointPolicy,
    ) -> Result<(), PipelineError> {
        let Some(revert_to) = policy.revert_to else {
            tracing::info!(
                item_id = %task.item_id,
                checkpoint = %task.checkpoint,
                "no reversion for this checkpoint, item parked for manual remediation"
            );
            return Ok(());
        };

        let mut item = self
            .stores
            .items
            .get(task.item_id)
            .await
            .ok_or(PipelineError::ItemNotFound {
                item_id: task.item_id,
            })?;

        tracing::info!(
            item_id = %item.id,
            checkpoint = %task.checkpoint,
            from = %item.status,
            to = %revert_to,
            "reverting item after review"
        );
        item.status = revert_to;
        self.stores.items.update(&item).await?;
        Ok(())
    }

    async fn decide(
        &self,
        task_id: Uuid,
        action: ReviewAction,
        notes: Option<String>,
    ) -> Result<ReviewDecision, PipelineError> {
        let decision = ReviewDecision::new(task_id, action, notes);
        self.stores.reviews.record_decision(decision.clone()).await;
        Ok(decision)
    }
}

/// A pipeline stage gating progression on human approval.
pub struct CheckpointStage {
    name: String,
    required: ItemStatus,
    output: ItemStatus,
    reviewed_artifact: String,
    gate: Arc<ReviewGate>,
    stores: Stores,
}

impl std::fmt::Debug for CheckpointStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStage")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("output", &self.output)
            .field("reviewed_artifact", &self.reviewed_artifact)
            .finish_non_exhaustive()
    }
}

impl CheckpointStage {
    /// Creates a checkpoint stage for a registered gate policy.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        required: ItemStatus,
        output: ItemStatus,
        reviewed_artifact: impl Into<String>,
        gate: Arc<ReviewGate>,
        stores: Stores,
    ) -> Self {
        Self {
            name: name.into(),
            required,
            output,
            reviewed_artifact: reviewed_artifact.into(),
            gate,
            stores,
        }
    }
}

#[async_trait]
impl Stage for CheckpointStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_status(&self) -> ItemStatus {
        self.required
    }

    fn output_status(&self) -> ItemStatus {
        self.output
    }

    async fn execute(
        &self,
        item: &Item,
        opts: StageOptions,
    ) -> Result<StageOutcome, PipelineError> {
        let bytes = self
            .stores
            .artifacts
            .read(item.id, &self.reviewed_artifact)
            .await?
            .ok_or_else(|| PipelineError::input_not_found(&self.name, &self.reviewed_artifact))?;

        let artifact_hash = content_digest(&bytes);
        let artifact_path = self.stores.artifacts.path(item.id, &self.reviewed_artifact);

        // An open task parks the item; re-reaching the gate never duplicates.
        if let Some(task) = self
            .stores
            .reviews
            .actionable_task(item.id, &self.name)
            .await
        {
            return Ok(StageOutcome::ReviewPending {
                checkpoint: self.name.clone(),
                detail: format!("awaiting review (task {})", task.id),
            });
        }

        // Only an approval of the *current* artifact lets the item through.
        // An approval of a since-regenerated artifact triggers a fresh task.
        if let Some(latest) = self.stores.reviews.latest_task(item.id, &self.name).await {
            if latest.status == ReviewTaskStatus::Approved && latest.artifact_hash == artifact_hash
            {
                if !opts.dry_run {
                    let mut updated = item.clone();
                    updated.status = self.output;
                    self.stores.items.update(&updated).await?;
                    let pass_id = opts.pass_id.unwrap_or_else(Uuid::new_v4);
                    self.stores
                        .runs
                        .append(StageRun::begin(item.id, &self.name, pass_id).succeed(0.0, 0, 0))
                        .await;
                }
                return Ok(StageOutcome::Completed(StageResult::completed(
                    "approved",
                    0.0,
                    vec![artifact_path],
                )));
            }
        }

        if opts.dry_run {
            return Ok(StageOutcome::ReviewPending {
                checkpoint: self.name.clone(),
                detail: "dry run: review task would be created".to_string(),
            });
        }

        let task = self
            .gate
            .create_task(
                item.id,
                &self.name,
                artifact_hash,
                vec![artifact_path],
                None,
            )
            .await?;

        Ok(StageOutcome::ReviewPending {
            checkpoint: self.name.clone(),
            detail: format!("review task {} created", task.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PipelineVersion;
    use pretty_assertions::assert_eq;

    const SCRIPT: &str = "script.txt";

    struct Rig {
        stores: Stores,
        gate: Arc<ReviewGate>,
        stage: CheckpointStage,
        item: Item,
    }

    async fn rig(revert_to: Option<ItemStatus>) -> Rig {
        let stores = Stores::in_memory();
        let gate = Arc::new(ReviewGate::new(stores.clone()).with_policy(CheckpointPolicy {
            checkpoint: "script_review".to_string(),
            reviewed_artifact: SCRIPT.to_string(),
            revert_to,
        }));
        let stage = CheckpointStage::new(
            "script_review",
            ItemStatus::Translated,
            ItemStatus::ScriptApproved,
            SCRIPT,
            gate.clone(),
            stores.clone(),
        );

        let mut item = Item::new("Episode 1", "https://media.example/ep1")
            .with_pipeline_version(PipelineVersion::V2);
        item.status = ItemStatus::Translated;
        stores.items.insert(item.clone()).await;
        stores
            .artifacts
            .write(item.id, SCRIPT, b"localized script")
            .await
            .unwrap();

        Rig {
            stores,
            gate,
            stage,
            item,
        }
    }

    async fn pending_task(rig: &Rig) -> ReviewTask {
        rig.stores
            .reviews
            .actionable_task(rig.item.id, "script_review")
            .await
            .expect("actionable task")
    }

    #[tokio::test]
    async fn first_pass_creates_task_and_parks() {
        let rig = rig(Some(ItemStatus::Transcribed)).await;

        let outcome = rig
            .stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        assert!(matches!(outcome, StageOutcome::ReviewPending { .. }));

        let task = pending_task(&rig).await;
        assert_eq!(task.status, ReviewTaskStatus::Pending);
        // Item status untouched while parked.
        let item = rig.stores.items.get(rig.item.id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Translated);
    }

    #[tokio::test]
    async fn reaching_gate_twice_reuses_open_task() {
        let rig = rig(Some(ItemStatus::Transcribed)).await;

        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        let first = pending_task(&rig).await;

        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        let second = pending_task(&rig).await;

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn approval_lets_next_pass_through() {
        let rig = rig(Some(ItemStatus::Transcribed)).await;
        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();

        let task = pending_task(&rig).await;
        rig.gate.approve(task.id, None).await.unwrap();

        // Approval alone does not advance the item.
        let item = rig.stores.items.get(rig.item.id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Translated);

        let outcome = rig.stage.execute(&item, StageOptions::default()).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Completed(_)));

        let item = rig.stores.items.get(rig.item.id).await.unwrap();
        assert_eq!(item.status, ItemStatus::ScriptApproved);
    }

    #[tokio::test]
    async fn stale_approval_triggers_fresh_task() {
        let rig = rig(Some(ItemStatus::Transcribed)).await;
        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        let task = pending_task(&rig).await;
        rig.gate.approve(task.id, None).await.unwrap();

        // The artifact changed after approval.
        rig.stores
            .artifacts
            .write(rig.item.id, SCRIPT, b"regenerated script")
            .await
            .unwrap();

        let item = rig.stores.items.get(rig.item.id).await.unwrap();
        let outcome = rig.stage.execute(&item, StageOptions::default()).await.unwrap();
        assert!(matches!(outcome, StageOutcome::ReviewPending { .. }));

        let fresh = pending_task(&rig).await;
        assert_ne!(fresh.id, task.id);
    }

    #[tokio::test]
    async fn reject_reverts_item() {
        let rig = rig(Some(ItemStatus::Transcribed)).await;
        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        let task = pending_task(&rig).await;

        rig.gate.reject(task.id, Some("not usable".to_string())).await.unwrap();

        let item = rig.stores.items.get(rig.item.id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Transcribed);
        // No staleness marker on plain rejection.
        assert!(rig
            .stores
            .provenance
            .peek_stale(rig.item.id, SCRIPT)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn request_changes_reverts_and_flags_artifact() {
        let rig = rig(Some(ItemStatus::Transcribed)).await;
        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        let task = pending_task(&rig).await;

        rig.gate
            .request_changes(task.id, "tone down the intro")
            .await
            .unwrap();

        let item = rig.stores.items.get(rig.item.id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Transcribed);

        let marker = rig
            .stores
            .provenance
            .peek_stale(rig.item.id, SCRIPT)
            .await
            .expect("marker");
        assert_eq!(marker.invalidated_by, "script_review");
        assert_eq!(marker.reason.as_deref(), Some("tone down the intro"));
    }

    #[tokio::test]
    async fn request_changes_requires_notes() {
        let rig = rig(Some(ItemStatus::Transcribed)).await;
        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        let task = pending_task(&rig).await;

        let err = rig.gate.request_changes(task.id, "   ").await.unwrap_err();
        assert!(matches!(err, PipelineError::NotesRequired));

        // Task untouched.
        assert_eq!(pending_task(&rig).await.id, task.id);
    }

    #[tokio::test]
    async fn acting_on_terminal_task_is_not_actionable() {
        let rig = rig(Some(ItemStatus::Transcribed)).await;
        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        let task = pending_task(&rig).await;

        rig.gate.approve(task.id, None).await.unwrap();
        let err = rig.gate.reject(task.id, None).await.unwrap_err();

        assert!(matches!(err, PipelineError::NotActionable { .. }));
    }

    #[tokio::test]
    async fn prepublish_checkpoint_parks_on_rejection() {
        let rig = rig(None).await;
        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        let task = pending_task(&rig).await;

        rig.gate.reject(task.id, None).await.unwrap();

        // Item stays where it was, parked for manual remediation.
        let item = rig.stores.items.get(rig.item.id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Translated);
    }

    #[tokio::test]
    async fn decisions_are_recorded() {
        let rig = rig(Some(ItemStatus::Transcribed)).await;
        rig.stage
            .execute(&rig.item, StageOptions::default())
            .await
            .unwrap();
        let task = pending_task(&rig).await;

        let decision = rig
            .gate
            .approve(task.id, Some("looks good".to_string()))
            .await
            .unwrap();
        assert_eq!(decision.action, ReviewAction::Approve);

        let decisions = rig.stores.reviews.decisions_for(task.id).await;
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].notes.as_deref(), Some("looks good"));
    }
}
