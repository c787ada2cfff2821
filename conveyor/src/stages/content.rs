//! Content-producing stages and the idempotency gate.
//!
//! Every content stage follows the same template: resolve inputs, hash them,
//! consult provenance and staleness markers, and only then pay for the
//! external call. The external work itself lives behind [`Collaborator`].

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::errors::PipelineError;
use crate::hashing::{content_digest, template_digest};
use crate::model::{Item, ItemStatus, StageRun};
use crate::pipeline::CostLedger;
use crate::provenance::{ProvenanceRecord, StalenessMarker};
use crate::store::Stores;
use uuid::Uuid;

use super::{Stage, StageOptions, StageOutcome, StageResult};

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    /// Creates a failure with a reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// What a collaborator is asked to do.
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    /// Raw input artifact bytes.
    pub input: Vec<u8>,
    /// Reviewer feedback from a changes-requested decision, when the stage
    /// re-runs because of one.
    pub feedback: Option<String>,
    /// Produce a placeholder without calling the live service.
    pub dry_run: bool,
}

/// What a collaborator produced.
#[derive(Debug, Clone)]
pub struct Production {
    /// The produced artifact bytes.
    pub output: Vec<u8>,
    /// Actual cost of the call in USD.
    pub cost_usd: f64,
    /// Tokens consumed, if metered.
    pub input_tokens: u64,
    /// Tokens produced, if metered.
    pub output_tokens: u64,
    /// Human-readable summary of the work.
    pub detail: String,
}

/// An external content transformer (speech-to-text, translation, rendering,
/// upload, ...). Opaque to the orchestration core.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Identifier of the template/prompt/model version in use. Hashed into
    /// provenance; bumping it invalidates previous outputs.
    fn template_version(&self) -> &str;

    /// Estimated cost of one call, checked against the ceiling before the
    /// call is made.
    fn estimated_cost_usd(&self) -> f64;

    /// Canonical form of the input used for hashing, so cosmetic edits do
    /// not force recomputation. Defaults to the identity.
    fn canonicalize(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    /// Performs the external work.
    async fn produce(&self, request: ProduceRequest) -> Result<Production, CollaboratorError>;
}

/// A pipeline stage that derives one artifact from one input through a
/// collaborator, gated by provenance.
pub struct ContentStage {
    name: String,
    required: ItemStatus,
    output: ItemStatus,
    input_artifact: Option<String>,
    output_artifact: String,
    invalidates: Option<String>,
    collaborator: Arc<dyn Collaborator>,
    stores: Stores,
    ledger: CostLedger,
}

impl std::fmt::Debug for ContentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStage")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("output", &self.output)
            .field("output_artifact", &self.output_artifact)
            .finish_non_exhaustive()
    }
}

impl ContentStage {
    /// Creates a content stage.
    ///
    /// The stage reads `input_artifact` (or, when `None`, the item's source
    /// url field — the ingestion stage has no upstream artifact), writes
    /// `output_artifact`, and advances the item from `required` to `output`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        required: ItemStatus,
        output: ItemStatus,
        output_artifact: impl Into<String>,
        collaborator: Arc<dyn Collaborator>,
        stores: Stores,
        ledger: CostLedger,
    ) -> Self {
        Self {
            name: name.into(),
            required,
            output,
            input_artifact: None,
            output_artifact: output_artifact.into(),
            invalidates: None,
            collaborator,
            stores,
            ledger,
        }
    }

    /// Sets the upstream artifact this stage consumes.
    #[must_use]
    pub fn with_input_artifact(mut self, name: impl Into<String>) -> Self {
        self.input_artifact = Some(name.into());
        self
    }

    /// Names the immediate successor's artifact to flag stale whenever this
    /// stage regenerates its own output. Cascades compose one hop at a time.
    #[must_use]
    pub fn invalidates(mut self, artifact: impl Into<String>) -> Self {
        self.invalidates = Some(artifact.into());
        self
    }

    async fn resolve_input(&self, item: &Item) -> Result<Vec<u8>, PipelineError> {
        match &self.input_artifact {
            Some(name) => self
                .stores
                .artifacts
                .read(item.id, name)
                .await?
                .ok_or_else(|| PipelineError::input_not_found(&self.name, name)),
            None => Ok(item.source_url.clone().into_bytes()),
        }
    }

    /// Provenance is valid evidence of "no re-run needed" only while the
    /// output exists and both hashes still match.
    async fn provenance_valid(
        &self,
        item_id: Uuid,
        input_hash: &str,
        prompt_hash: &str,
    ) -> Result<Option<ProvenanceRecord>, PipelineError> {
        let Some(record) = self.stores.provenance.record(item_id, &self.name).await else {
            return Ok(None);
        };

        let output_exists = self
            .stores
            .artifacts
            .exists(item_id, &self.output_artifact)
            .await?;

        let valid = output_exists
            && record.prompt_hash == prompt_hash
            && record.input_hashes == [input_hash.to_string()];

        Ok(valid.then_some(record))
    }

    async fn advance_status(&self, item: &Item) -> Result<(), PipelineError> {
        let mut updated = item.clone();
        updated.status = self.output;
        self.stores.items.update(&updated).await?;
        Ok(())
    }
}

#[async_trait]
impl Stage for ContentStage {
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
        let input = self.resolve_input(item).await?;
        let canonical = self.collaborator.canonicalize(&input);
        let input_hash = content_digest(&canonical);
        let prompt_hash = template_digest(self.collaborator.template_version());

        // A marker forces re-execution regardless of hash match. Peek only:
        // it is consumed when the regenerated provenance is committed, so a
        // refused or failed call leaves the invalidation in place.
        let marker = self
            .stores
            .provenance
            .peek_stale(item.id, &self.output_artifact)
            .await;
        let feedback = marker.as_ref().and_then(|m| m.reason.clone());

        if !opts.force && marker.is_none() {
            if let Some(record) = self
                .provenance_valid(item.id, &input_hash, &prompt_hash)
                .await?
            {
                tracing::info!(
                    item_id = %item.id,
                    stage = %self.name,
                    "inputs and template unchanged, skipping"
                );
                if !opts.dry_run {
                    self.advance_status(item).await?;
                }
                return Ok(StageOutcome::Completed(StageResult::skipped(
                    "inputs and template unchanged",
                    record.output_files,
                )));
            }
        }

        if let Some(m) = &marker {
            tracing::info!(
                item_id = %item.id,
                stage = %self.name,
                invalidated_by = %m.invalidated_by,
                "output flagged stale, re-running"
            );
        }

        if opts.dry_run {
            let production = self
                .collaborator
                .produce(ProduceRequest {
                    input,
                    feedback,
                    dry_run: true,
                })
                .await
                .map_err(|e| PipelineError::collaborator(&self.name, e.to_string()))?;

            return Ok(StageOutcome::Completed(StageResult::completed(
                format!("dry run: {}", production.detail),
                0.0,
                vec![self.stores.artifacts.path(item.id, &self.output_artifact)],
            )));
        }

        self.ledger
            .reserve(
                self.stores.runs.as_ref(),
                item.id,
                self.collaborator.estimated_cost_usd(),
            )
            .await?;

        let run = StageRun::begin(item.id, &self.name, opts.pass_id.unwrap_or_else(Uuid::new_v4));

        let production = match self
            .collaborator
            .produce(ProduceRequest {
                input,
                feedback,
                dry_run: false,
            })
            .await
        {
            Ok(production) => production,
            Err(err) => {
                self.stores.runs.append(run.fail(err.to_string())).await;
                return Err(PipelineError::collaborator(&self.name, err.to_string()));
            }
        };

        let path = self
            .stores
            .artifacts
            .write(item.id, &self.output_artifact, &production.output)
            .await?;

        // Commit: consume the marker and supersede the record together.
        self.stores
            .provenance
            .take_stale(item.id, &self.output_artifact)
            .await;
        self.stores
            .provenance
            .supersede(ProvenanceRecord {
                stage: self.name.clone(),
                item_id: item.id,
                timestamp: chrono::Utc::now(),
                prompt_hash,
                input_hashes: vec![input_hash],
                output_files: vec![path.clone()],
                cost_usd: production.cost_usd,
                input_tokens: production.input_tokens,
                output_tokens: production.output_tokens,
            })
            .await;

        // Cascade one hop forward: the successor's existing output is now
        // derived from a superseded artifact.
        if let Some(successor) = &self.invalidates {
            if self.stores.artifacts.exists(item.id, successor).await? {
                self.stores
                    .provenance
                    .mark_stale(
                        item.id,
                        StalenessMarker::new(successor.clone(), self.name.clone())
                            .with_reason(format!("{} regenerated", self.output_artifact)),
                    )
                    .await;
            }
        }

        self.advance_status(item).await?;
        self.stores
            .runs
            .append(run.succeed(
                production.cost_usd,
                production.input_tokens,
                production.output_tokens,
            ))
            .await;

        tracing::info!(
            item_id = %item.id,
            stage = %self.name,
            cost_usd = production.cost_usd,
            "stage completed"
        );

        Ok(StageOutcome::Completed(StageResult::completed(
            production.detail,
            production.cost_usd,
            vec![path],
        )))
    }
}
