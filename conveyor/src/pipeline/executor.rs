//! The pipeline executor.
//!
//! Walks a pipeline's stage list for one item, invoking stages through the
//! stage contract and rolling results up into a report. One invocation is
//! one pass; items with review gates need several passes to drain.

use std::time::Instant;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::model::{Item, PipelineReport, StageDisposition, StageReport};
use crate::stages::{StageOptions, StageOutcome};
use crate::store::Stores;

use super::definition::{PipelineDefinition, PipelineSet};
use super::plan::{self, Plan, PlanAction};

/// Options for one executor pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorConfig {
    /// Re-run every stage, bypassing idempotency.
    pub force: bool,
    /// Thread dry-run through every stage; nothing is committed.
    pub dry_run: bool,
}

/// Executes pipeline passes over single items.
///
/// Holds its stage registries and stores by construction; per-item
/// serialization is the caller's responsibility (the batch runner processes
/// items one at a time) and the item store's compare-and-swap backstops it.
#[derive(Debug)]
pub struct PipelineExecutor {
    pipelines: PipelineSet,
    stores: Stores,
}

impl PipelineExecutor {
    /// Creates an executor over a set of pipeline definitions.
    #[must_use]
    pub fn new(pipelines: PipelineSet, stores: Stores) -> Self {
        Self { pipelines, stores }
    }

    async fn item(&self, item_id: Uuid) -> Result<Item, PipelineError> {
        self.stores
            .items
            .get(item_id)
            .await
            .ok_or(PipelineError::ItemNotFound { item_id })
    }

    fn definition(
        &self,
        item: &Item,
    ) -> Result<std::sync::Arc<PipelineDefinition>, PipelineError> {
        self.pipelines
            .for_version(item.pipeline_version)
            .ok_or_else(|| {
                PipelineError::validation(format!(
                    "no pipeline registered for version {}",
                    item.pipeline_version
                ))
            })
    }

    /// Resolves the plan for an item without executing anything.
    pub async fn preview(&self, item_id: Uuid, force: bool) -> Result<Plan, PipelineError> {
        let item = self.item(item_id).await?;
        let definition = self.definition(&item)?;
        Ok(plan::resolve(&definition, &item, force))
    }

    /// Runs a single named stage, validating the item's position first.
    ///
    /// Without `force` the item must sit exactly at the stage's required
    /// status; anything else is a validation error, not a silent skip.
    pub async fn run_stage(
        &self,
        item_id: Uuid,
        stage_name: &str,
        opts: StageOptions,
    ) -> Result<StageOutcome, PipelineError> {
        let item = self.item(item_id).await?;
        let definition = self.definition(&item)?;
        let stage = definition.stage(stage_name).ok_or_else(|| {
            PipelineError::validation(format!(
                "unknown stage '{stage_name}' in pipeline {}",
                definition.version()
            ))
        })?;

        if !opts.force && item.status != stage.required_status() {
            return Err(PipelineError::validation(format!(
                "item {item_id} is '{}' but stage '{stage_name}' requires '{}' \
                 (pass force to override)",
                item.status,
                stage.required_status(),
            )));
        }

        stage.execute(&item, opts).await
    }

    /// Runs one pass over an item and persists the report.
    ///
    /// The pass halts on the first stage failure (surfacing it on the item)
    /// or on a review gate (surfacing nothing; waiting is not an error).
    pub async fn run(
        &self,
        item_id: Uuid,
        config: ExecutorConfig,
    ) -> Result<PipelineReport, PipelineError> {
        let item = self.item(item_id).await?;
        let definition = self.definition(&item)?;
        let plan = plan::resolve(&definition, &item, config.force);

        let mut report = PipelineReport::begin(item_id);
        let mut failed = false;

        tracing::info!(%item_id, pass_id = %report.pass_id, version = %definition.version(), "executor pass starting");

        'stages: for (stage, entry) in definition.stages().iter().zip(&plan.entries) {
            if entry.action == PlanAction::Skip {
                report.push_stage(StageReport {
                    stage: stage.name().to_string(),
                    status: StageDisposition::Skipped,
                    duration_ms: 0,
                    detail: entry.reason.clone(),
                    error: None,
                    cost_usd: 0.0,
                });
                continue;
            }

            // Refresh before each stage: the previous stage committed a new
            // status, and other processes may have moved the item too.
            let current = self.item(item_id).await?;
            let required_rank = definition
                .rank(stage.required_status())
                .unwrap_or(usize::MAX);
            let current_rank = definition.rank(current.status);

            if !config.force {
                match current_rank {
                    Some(rank) if rank > required_rank => {
                        report.push_stage(StageReport {
                            stage: stage.name().to_string(),
                            status: StageDisposition::Skipped,
                            duration_ms: 0,
                            detail: "already completed".to_string(),
                            error: None,
                            cost_usd: 0.0,
                        });
                        continue;
                    }
                    Some(rank) if rank == required_rank => {}
                    _ => {
                        // A prior stage did not advance the item (dry run, or
                        // external interference). Nothing further can run.
                        report.push_stage(StageReport {
                            stage: stage.name().to_string(),
                            status: StageDisposition::Skipped,
                            duration_ms: 0,
                            detail: "not ready".to_string(),
                            error: None,
                            cost_usd: 0.0,
                        });
                        break 'stages;
                    }
                }
            }

            let started = Instant::now();
            let opts = StageOptions {
                force: config.force,
                dry_run: config.dry_run,
                pass_id: Some(report.pass_id),
            };

            match stage.execute(&current, opts).await {
                Ok(StageOutcome::Completed(result)) => {
                    report.push_stage(StageReport {
                        stage: stage.name().to_string(),
                        status: if result.skipped {
                            StageDisposition::Skipped
                        } else {
                            StageDisposition::Success
                        },
                        duration_ms: duration_ms(started),
                        detail: result.detail,
                        error: None,
                        cost_usd: result.cost_usd,
                    });
                }
                Ok(StageOutcome::ReviewPending { checkpoint, detail }) => {
                    tracing::info!(%item_id, %checkpoint, "pass parked on review gate");
                    report.push_stage(StageReport {
                        stage: stage.name().to_string(),
                        status: StageDisposition::ReviewPending,
                        duration_ms: duration_ms(started),
                        detail,
                        error: None,
                        cost_usd: 0.0,
                    });
                    break 'stages;
                }
                Err(err) => {
                    let message = err.to_string();
                    tracing::error!(%item_id, stage = stage.name(), error = %message, "stage failed, halting pass");
                    report.push_stage(StageReport {
                        stage: stage.name().to_string(),
                        status: StageDisposition::Failed,
                        duration_ms: duration_ms(started),
                        detail: String::new(),
                        error: Some(message.clone()),
                        cost_usd: 0.0,
                    });

                    let mut latest = self.item(item_id).await?;
                    latest.error_message = Some(message.clone());
                    latest.retry_count += 1;
                    self.stores.items.update(&latest).await?;

                    report.finish(false, Some(message));
                    failed = true;
                    break 'stages;
                }
            }
        }

        if !failed {
            // A clean pass clears any error left over from an earlier one.
            let latest = self.item(item_id).await?;
            if latest.error_message.is_some() && !config.dry_run {
                let mut cleared = latest;
                cleared.error_message = None;
                self.stores.items.update(&cleared).await?;
            }
            report.finish(true, None);
        }

        self.stores.reports.append(report.clone()).await;
        tracing::info!(
            %item_id,
            pass_id = %report.pass_id,
            success = report.success,
            total_cost_usd = report.total_cost_usd,
            "executor pass finished"
        );
        Ok(report)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
