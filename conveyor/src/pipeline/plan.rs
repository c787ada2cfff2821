//! The plan resolver.
//!
//! Computes run/skip/pending for every stage of a pipeline given an item's
//! current status, without performing any side effect. The same function
//! backs headless execution and human-readable previews; it is total and
//! cannot error.

use std::fmt::Write as _;

use crate::model::Item;

use super::definition::PipelineDefinition;

/// What the resolver decided for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// The stage should execute in this pass.
    Run,
    /// Nothing to do (already completed, or not reachable).
    Skip,
    /// Will become runnable once the earlier stages of this pass complete.
    Pending,
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Skip => write!(f, "skip"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

/// The decision for one stage plus its reason.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Stage name.
    pub stage: String,
    /// The decision.
    pub action: PlanAction,
    /// Human-readable reason.
    pub reason: String,
}

/// The skip/run/pending decision for every stage, in order.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Per-stage decisions in pipeline order.
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    /// Renders the plan as an aligned preview table.
    #[must_use]
    pub fn render(&self) -> String {
        let width = self
            .entries
            .iter()
            .map(|e| e.stage.len())
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{:width$}  {:7}  {}",
                entry.stage, entry.action, entry.reason
            );
        }
        out
    }

    /// Returns true if any stage would run.
    #[must_use]
    pub fn has_work(&self) -> bool {
        self.entries.iter().any(|e| e.action == PlanAction::Run)
    }
}

/// Resolves the plan for an item against a pipeline definition.
///
/// `force` marks every stage `run`. Otherwise a stage runs exactly when the
/// item's status rank equals the stage's required rank; stages behind that
/// point are already completed, stages past it wait on the ones before them.
#[must_use]
pub fn resolve(definition: &PipelineDefinition, item: &Item, force: bool) -> Plan {
    let item_rank = definition.rank(item.status);
    let mut saw_run = false;
    let mut entries = Vec::with_capacity(definition.stages().len());

    for (required_rank, stage) in definition.stages().iter().enumerate() {
        let (action, reason) = if force {
            (PlanAction::Run, "forced".to_string())
        } else {
            match item_rank {
                None => (
                    PlanAction::Skip,
                    format!("status '{}' not in this pipeline", item.status),
                ),
                Some(rank) if rank > required_rank => {
                    (PlanAction::Skip, "already completed".to_string())
                }
                Some(rank) if rank == required_rank => {
                    (PlanAction::Run, "status matches".to_string())
                }
                Some(_) if saw_run => (PlanAction::Pending, "after prior stages".to_string()),
                Some(_) => (PlanAction::Skip, "not ready".to_string()),
            }
        };

        saw_run = saw_run || action == PlanAction::Run;
        entries.push(PlanEntry {
            stage: stage.name().to_string(),
            action,
            reason,
        });
    }

    Plan { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;
    use crate::model::{ItemStatus, PipelineVersion};
    use crate::stages::{Stage, StageOptions, StageOutcome};
    use async_trait::async_trait;
    use std::sync::Arc;

    #[derive(Debug)]
    struct LegStage {
        name: &'static str,
        required: ItemStatus,
        output: ItemStatus,
    }

    #[async_trait]
    impl Stage for LegStage {
        fn name(&self) -> &str {
            self.name
        }

        fn required_status(&self) -> ItemStatus {
            self.required
        }

        fn output_status(&self) -> ItemStatus {
            self.output
        }

        async fn execute(
            &self,
            _item: &Item,
            _opts: StageOptions,
        ) -> Result<StageOutcome, PipelineError> {
            unreachable!("plan tests never execute stages")
        }
    }

    fn definition() -> PipelineDefinition {
        let legs: Vec<Arc<dyn Stage>> = vec![
            Arc::new(LegStage {
                name: "download",
                required: ItemStatus::New,
                output: ItemStatus::Downloaded,
            }),
            Arc::new(LegStage {
                name: "transcribe",
                required: ItemStatus::Downloaded,
                output: ItemStatus::Transcribed,
            }),
            Arc::new(LegStage {
                name: "translate",
                required: ItemStatus::Transcribed,
                output: ItemStatus::Translated,
            }),
        ];
        PipelineDefinition::new(PipelineVersion::V2, legs).unwrap()
    }

    fn item_at(status: ItemStatus) -> Item {
        let mut item = Item::new("Episode 1", "https://media.example/ep1");
        item.status = status;
        item
    }

    #[test]
    fn midway_item_skips_run_pends() {
        let plan = resolve(&definition(), &item_at(ItemStatus::Downloaded), false);

        assert_eq!(plan.entries[0].action, PlanAction::Skip);
        assert_eq!(plan.entries[0].reason, "already completed");
        assert_eq!(plan.entries[1].action, PlanAction::Run);
        assert_eq!(plan.entries[2].action, PlanAction::Pending);
        assert_eq!(plan.entries[2].reason, "after prior stages");
        assert!(plan.has_work());
    }

    #[test]
    fn completed_item_skips_everything() {
        let plan = resolve(&definition(), &item_at(ItemStatus::Translated), false);

        assert!(plan
            .entries
            .iter()
            .all(|e| e.action == PlanAction::Skip && e.reason == "already completed"));
        assert!(!plan.has_work());
    }

    #[test]
    fn force_marks_every_stage_run() {
        let plan = resolve(&definition(), &item_at(ItemStatus::Translated), true);

        assert!(plan.entries.iter().all(|e| e.action == PlanAction::Run));
    }

    #[test]
    fn stages_below_item_rank_never_run() {
        // Plan monotonicity: anything behind the item's position is a skip.
        for status in [ItemStatus::Downloaded, ItemStatus::Transcribed, ItemStatus::Translated] {
            let plan = resolve(&definition(), &item_at(status), false);
            let def = definition();
            let rank = def.rank(status).unwrap();
            for entry in plan.entries.iter().take(rank) {
                assert_eq!(entry.action, PlanAction::Skip, "stage {}", entry.stage);
            }
        }
    }

    #[test]
    fn unknown_status_is_total_skip() {
        let plan = resolve(&definition(), &item_at(ItemStatus::Published), false);

        assert!(plan.entries.iter().all(|e| e.action == PlanAction::Skip));
        assert!(plan.entries[0].reason.contains("not in this pipeline"));
    }

    #[test]
    fn render_lists_every_stage() {
        let plan = resolve(&definition(), &item_at(ItemStatus::New), false);
        let rendered = plan.render();

        assert!(rendered.contains("download"));
        assert!(rendered.contains("status matches"));
        assert!(rendered.contains("after prior stages"));
        assert_eq!(rendered.lines().count(), 3);
    }
}
