//! The concrete stage lists for the media localization pipelines.
//!
//! Two versions are in service. V2 adds voiceover synthesis and artwork
//! rendering; V1 assembles straight from the approved script. Both share
//! the same checkpoints and reversion policy.

use std::sync::Arc;

use crate::errors::PipelineError;
use crate::model::{ItemStatus, PipelineVersion};
use crate::review::{CheckpointPolicy, CheckpointStage, ReviewGate};
use crate::stages::{Collaborator, ContentStage, Stage};
use crate::store::Stores;

use super::cost::CostLedger;
use super::definition::{PipelineDefinition, PipelineSet};

/// Fetched source media.
pub const SOURCE_MEDIA: &str = "source.media";
/// Transcript of the source audio.
pub const TRANSCRIPT: &str = "transcript.txt";
/// Localized script.
pub const SCRIPT: &str = "script.txt";
/// Synthesized voiceover.
pub const VOICE: &str = "voice.audio";
/// Rendered artwork bundle.
pub const ART: &str = "art.images";
/// Assembled episode video.
pub const VIDEO: &str = "episode.video";
/// Upload receipt from the publishing target.
pub const RECEIPT: &str = "publish.receipt";

/// Script checkpoint name.
pub const SCRIPT_REVIEW: &str = "script_review";
/// Pre-publish checkpoint name.
pub const RELEASE_REVIEW: &str = "release_review";

/// The external collaborators behind the content stages.
#[derive(Clone)]
pub struct MediaCollaborators {
    /// Fetches source media.
    pub download: Arc<dyn Collaborator>,
    /// Speech-to-text.
    pub transcribe: Arc<dyn Collaborator>,
    /// Script translation.
    pub translate: Arc<dyn Collaborator>,
    /// Text-to-speech voiceover.
    pub synthesize: Arc<dyn Collaborator>,
    /// Artwork rendering.
    pub illustrate: Arc<dyn Collaborator>,
    /// Video assembly.
    pub assemble: Arc<dyn Collaborator>,
    /// Upload to the publishing target.
    pub publish: Arc<dyn Collaborator>,
}

impl std::fmt::Debug for MediaCollaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCollaborators").finish_non_exhaustive()
    }
}

/// Builds the review gate with both checkpoint policies registered.
///
/// The script checkpoint reverts to `Transcribed` so the translation re-runs
/// after rejection; the pre-publish checkpoint never reverts and leaves the
/// item parked for manual remediation.
#[must_use]
pub fn review_gate(stores: &Stores) -> ReviewGate {
    ReviewGate::new(stores.clone())
        .with_policy(CheckpointPolicy {
            checkpoint: SCRIPT_REVIEW.to_string(),
            reviewed_artifact: SCRIPT.to_string(),
            revert_to: Some(ItemStatus::Transcribed),
        })
        .with_policy(CheckpointPolicy {
            checkpoint: RELEASE_REVIEW.to_string(),
            reviewed_artifact: VIDEO.to_string(),
            revert_to: None,
        })
}

/// Builds the current (V2) pipeline definition.
pub fn definition_v2(
    collaborators: &MediaCollaborators,
    gate: &Arc<ReviewGate>,
    stores: &Stores,
    ledger: CostLedger,
) -> Result<PipelineDefinition, PipelineError> {
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(
            ContentStage::new(
                "download",
                ItemStatus::New,
                ItemStatus::Downloaded,
                SOURCE_MEDIA,
                collaborators.download.clone(),
                stores.clone(),
                ledger,
            )
            .invalidates(TRANSCRIPT),
        ),
        Arc::new(
            ContentStage::new(
                "transcribe",
                ItemStatus::Downloaded,
                ItemStatus::Transcribed,
                TRANSCRIPT,
                collaborators.transcribe.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(SOURCE_MEDIA)
            .invalidates(SCRIPT),
        ),
        Arc::new(
            ContentStage::new(
                "translate",
                ItemStatus::Transcribed,
                ItemStatus::Translated,
                SCRIPT,
                collaborators.translate.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(TRANSCRIPT)
            .invalidates(VOICE),
        ),
        Arc::new(CheckpointStage::new(
            SCRIPT_REVIEW,
            ItemStatus::Translated,
            ItemStatus::ScriptApproved,
            SCRIPT,
            gate.clone(),
            stores.clone(),
        )),
        Arc::new(
            ContentStage::new(
                "synthesize",
                ItemStatus::ScriptApproved,
                ItemStatus::Voiced,
                VOICE,
                collaborators.synthesize.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(SCRIPT)
            .invalidates(VIDEO),
        ),
        Arc::new(
            ContentStage::new(
                "illustrate",
                ItemStatus::Voiced,
                ItemStatus::Illustrated,
                ART,
                collaborators.illustrate.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(SCRIPT)
            .invalidates(VIDEO),
        ),
        Arc::new(
            ContentStage::new(
                "assemble",
                ItemStatus::Illustrated,
                ItemStatus::Assembled,
                VIDEO,
                collaborators.assemble.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(VOICE),
        ),
        Arc::new(CheckpointStage::new(
            RELEASE_REVIEW,
            ItemStatus::Assembled,
            ItemStatus::ReleaseApproved,
            VIDEO,
            gate.clone(),
            stores.clone(),
        )),
        Arc::new(
            ContentStage::new(
                "publish",
                ItemStatus::ReleaseApproved,
                ItemStatus::Published,
                RECEIPT,
                collaborators.publish.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(VIDEO),
        ),
    ];

    PipelineDefinition::new(PipelineVersion::V2, stages)
}

/// Builds the legacy (V1) pipeline definition.
pub fn definition_v1(
    collaborators: &MediaCollaborators,
    gate: &Arc<ReviewGate>,
    stores: &Stores,
    ledger: CostLedger,
) -> Result<PipelineDefinition, PipelineError> {
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(
            ContentStage::new(
                "download",
                ItemStatus::New,
                ItemStatus::Downloaded,
                SOURCE_MEDIA,
                collaborators.download.clone(),
                stores.clone(),
                ledger,
            )
            .invalidates(TRANSCRIPT),
        ),
        Arc::new(
            ContentStage::new(
                "transcribe",
                ItemStatus::Downloaded,
                ItemStatus::Transcribed,
                TRANSCRIPT,
                collaborators.transcribe.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(SOURCE_MEDIA)
            .invalidates(SCRIPT),
        ),
        Arc::new(
            ContentStage::new(
                "translate",
                ItemStatus::Transcribed,
                ItemStatus::Translated,
                SCRIPT,
                collaborators.translate.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(TRANSCRIPT)
            .invalidates(VIDEO),
        ),
        Arc::new(CheckpointStage::new(
            SCRIPT_REVIEW,
            ItemStatus::Translated,
            ItemStatus::ScriptApproved,
            SCRIPT,
            gate.clone(),
            stores.clone(),
        )),
        Arc::new(
            ContentStage::new(
                "assemble",
                ItemStatus::ScriptApproved,
                ItemStatus::Assembled,
                VIDEO,
                collaborators.assemble.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(SCRIPT),
        ),
        Arc::new(CheckpointStage::new(
            RELEASE_REVIEW,
            ItemStatus::Assembled,
            ItemStatus::ReleaseApproved,
            VIDEO,
            gate.clone(),
            stores.clone(),
        )),
        Arc::new(
            ContentStage::new(
                "publish",
                ItemStatus::ReleaseApproved,
                ItemStatus::Published,
                RECEIPT,
                collaborators.publish.clone(),
                stores.clone(),
                ledger,
            )
            .with_input_artifact(VIDEO),
        ),
    ];

    PipelineDefinition::new(PipelineVersion::V1, stages)
}

/// Builds the standard pipeline set with its review gate.
pub fn standard_pipelines(
    collaborators: &MediaCollaborators,
    stores: &Stores,
    ledger: CostLedger,
) -> Result<(PipelineSet, Arc<ReviewGate>), PipelineError> {
    let gate = Arc::new(review_gate(stores));
    let set = PipelineSet::new()
        .register(definition_v1(collaborators, &gate, stores, ledger)?)
        .register(definition_v2(collaborators, &gate, stores, ledger)?);
    Ok((set, gate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubCollaborator;

    fn stub_collaborators() -> MediaCollaborators {
        let stub = |version: &str| -> Arc<dyn Collaborator> {
            Arc::new(StubCollaborator::new(version).with_output(b"bytes".to_vec()))
        };
        MediaCollaborators {
            download: stub("download/v1"),
            transcribe: stub("transcribe/v1"),
            translate: stub("translate/v1"),
            synthesize: stub("synthesize/v1"),
            illustrate: stub("illustrate/v1"),
            assemble: stub("assemble/v1"),
            publish: stub("publish/v1"),
        }
    }

    #[test]
    fn both_definitions_validate() {
        let stores = Stores::in_memory();
        let (set, _gate) =
            standard_pipelines(&stub_collaborators(), &stores, CostLedger::default()).unwrap();

        let v2 = set.for_version(PipelineVersion::V2).unwrap();
        assert_eq!(v2.stages().len(), 9);
        assert_eq!(v2.rank(ItemStatus::Published), Some(9));

        let v1 = set.for_version(PipelineVersion::V1).unwrap();
        assert_eq!(v1.stages().len(), 7);
        assert!(v1.rank(ItemStatus::Voiced).is_none());
    }

    #[test]
    fn checkpoints_sit_between_content_stages() {
        let stores = Stores::in_memory();
        let (set, _gate) =
            standard_pipelines(&stub_collaborators(), &stores, CostLedger::default()).unwrap();
        let v2 = set.for_version(PipelineVersion::V2).unwrap();

        assert!(v2.stage(SCRIPT_REVIEW).is_some());
        assert!(v2.stage(RELEASE_REVIEW).is_some());
        assert_eq!(
            v2.stage(SCRIPT_REVIEW).unwrap().required_status(),
            ItemStatus::Translated
        );
    }
}
