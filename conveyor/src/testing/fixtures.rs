//! A fully wired in-memory pipeline harness for tests.

use std::sync::Arc;

use crate::batch::BatchRunner;
use crate::errors::PipelineError;
use crate::model::{Item, ReviewDecision};
use crate::pipeline::{standard_pipelines, CostLedger, MediaCollaborators, PipelineExecutor};
use crate::review::ReviewGate;
use crate::store::Stores;
use uuid::Uuid;

use super::stubs::StubCollaborator;

/// The stub collaborators behind a harness, kept as concrete types so tests
/// can script failures and inspect call counts.
pub struct StubSet {
    /// Source fetch stub.
    pub download: Arc<StubCollaborator>,
    /// Speech-to-text stub.
    pub transcribe: Arc<StubCollaborator>,
    /// Translation stub.
    pub translate: Arc<StubCollaborator>,
    /// Voiceover stub.
    pub synthesize: Arc<StubCollaborator>,
    /// Artwork stub.
    pub illustrate: Arc<StubCollaborator>,
    /// Assembly stub.
    pub assemble: Arc<StubCollaborator>,
    /// Upload stub.
    pub publish: Arc<StubCollaborator>,
}

/// An executor, batch runner, and review gate over in-memory stores and
/// scripted collaborators.
pub struct Harness {
    /// The shared store bundle.
    pub stores: Stores,
    /// The review gate.
    pub gate: Arc<ReviewGate>,
    /// The executor over both pipeline versions.
    pub executor: Arc<PipelineExecutor>,
    /// The batch runner in front of the executor.
    pub batch: BatchRunner,
    /// The scripted collaborators.
    pub collaborators: StubSet,
}

impl Harness {
    /// Builds a harness with the default cost ceiling.
    pub fn new() -> Result<Self, PipelineError> {
        Self::with_ledger(CostLedger::default())
    }

    /// Builds a harness with a custom cost ledger.
    pub fn with_ledger(ledger: CostLedger) -> Result<Self, PipelineError> {
        let stores = Stores::in_memory();

        let stubs = StubSet {
            download: Arc::new(
                StubCollaborator::new("download/v1").with_output(b"source media bytes".to_vec()),
            ),
            transcribe: Arc::new(
                StubCollaborator::new("transcribe/v1")
                    .with_output(b"transcript text".to_vec())
                    .with_cost(0.02)
                    .with_tokens(1000, 400),
            ),
            translate: Arc::new(
                StubCollaborator::new("translate/v1")
                    .with_output(b"localized script".to_vec())
                    .with_cost(0.03)
                    .with_tokens(400, 500),
            ),
            synthesize: Arc::new(
                StubCollaborator::new("synthesize/v1")
                    .with_output(b"voiceover audio".to_vec())
                    .with_cost(0.04),
            ),
            illustrate: Arc::new(
                StubCollaborator::new("illustrate/v1")
                    .with_output(b"artwork bundle".to_vec())
                    .with_cost(0.05),
            ),
            assemble: Arc::new(
                StubCollaborator::new("assemble/v1").with_output(b"episode video".to_vec()),
            ),
            publish: Arc::new(
                StubCollaborator::new("publish/v1").with_output(b"upload receipt".to_vec()),
            ),
        };

        let collaborators = MediaCollaborators {
            download: stubs.download.clone(),
            transcribe: stubs.transcribe.clone(),
            translate: stubs.translate.clone(),
            synthesize: stubs.synthesize.clone(),
            illustrate: stubs.illustrate.clone(),
            assemble: stubs.assemble.clone(),
            publish: stubs.publish.clone(),
        };

        let (pipelines, gate) = standard_pipelines(&collaborators, &stores, ledger)?;
        let executor = Arc::new(PipelineExecutor::new(pipelines, stores.clone()));
        let batch = BatchRunner::new(executor.clone(), stores.clone());

        Ok(Self {
            stores,
            gate,
            executor,
            batch,
            collaborators: stubs,
        })
    }

    /// Inserts a fresh item and returns it.
    pub async fn ingest(&self, title: &str) -> Item {
        let slug = title.to_lowercase().replace(' ', "-");
        let item = Item::new(title, format!("https://media.example/{slug}"));
        self.stores.items.insert(item.clone()).await;
        item
    }

    /// Fetches the current copy of an item.
    ///
    /// # Panics
    ///
    /// Panics if the item does not exist; harness items always do.
    #[must_use]
    pub async fn item(&self, item_id: Uuid) -> Item {
        self.stores
            .items
            .get(item_id)
            .await
            .unwrap_or_else(|| panic!("harness item {item_id} missing"))
    }

    /// Approves the open task at a checkpoint.
    pub async fn approve_pending(
        &self,
        item_id: Uuid,
        checkpoint: &str,
    ) -> Result<ReviewDecision, PipelineError> {
        let task = self
            .stores
            .reviews
            .actionable_task(item_id, checkpoint)
            .await
            .ok_or_else(|| {
                PipelineError::validation(format!("no actionable task at '{checkpoint}'"))
            })?;
        self.gate.approve(task.id, None).await
    }
}
