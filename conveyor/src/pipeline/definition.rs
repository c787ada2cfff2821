//! Versioned pipeline definitions.
//!
//! A definition is the one piece of configuration that shapes the state
//! machine: an ordered stage list whose statuses chain strictly from one
//! stage to the next. It is built once and passed into the resolver and
//! executor; there is no process-wide registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::PipelineError;
use crate::model::{ItemStatus, PipelineVersion};
use crate::stages::Stage;

/// An ordered, validated stage list for one pipeline version.
#[derive(Debug)]
pub struct PipelineDefinition {
    version: PipelineVersion,
    stages: Vec<Arc<dyn Stage>>,
    status_order: Vec<ItemStatus>,
}

impl PipelineDefinition {
    /// Builds a definition, validating that the stages chain: each stage
    /// must advance from exactly the status the previous one produced, and
    /// no status may repeat.
    pub fn new(
        version: PipelineVersion,
        stages: Vec<Arc<dyn Stage>>,
    ) -> Result<Self, PipelineError> {
        let Some(first) = stages.first() else {
            return Err(PipelineError::validation(format!(
                "pipeline {version} has no stages"
            )));
        };

        let mut status_order = vec![first.required_status()];
        for stage in &stages {
            let expected = *status_order
                .last()
                .unwrap_or(&first.required_status());
            if stage.required_status() != expected {
                return Err(PipelineError::validation(format!(
                    "pipeline {version}: stage '{}' requires status '{}' but the \
                     preceding stage produces '{expected}'",
                    stage.name(),
                    stage.required_status(),
                )));
            }
            if status_order.contains(&stage.output_status()) {
                return Err(PipelineError::validation(format!(
                    "pipeline {version}: stage '{}' produces status '{}' which an \
                     earlier stage already reaches",
                    stage.name(),
                    stage.output_status(),
                )));
            }
            status_order.push(stage.output_status());
        }

        Ok(Self {
            version,
            stages,
            status_order,
        })
    }

    /// The pipeline version this definition serves.
    #[must_use]
    pub fn version(&self) -> PipelineVersion {
        self.version
    }

    /// The ordered stage list.
    #[must_use]
    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    /// Integer rank of a status within this pipeline, or `None` when the
    /// status is not part of it. Stage `i` requires rank `i` and produces
    /// rank `i + 1`.
    #[must_use]
    pub fn rank(&self, status: ItemStatus) -> Option<usize> {
        self.status_order.iter().position(|s| *s == status)
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Arc<dyn Stage>> {
        self.stages.iter().find(|s| s.name() == name)
    }
}

/// The definitions in service, keyed by version.
#[derive(Debug, Default)]
pub struct PipelineSet {
    definitions: HashMap<PipelineVersion, Arc<PipelineDefinition>>,
}

impl PipelineSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition.
    #[must_use]
    pub fn register(mut self, definition: PipelineDefinition) -> Self {
        self.definitions
            .insert(definition.version(), Arc::new(definition));
        self
    }

    /// Returns the definition for a version.
    #[must_use]
    pub fn for_version(&self, version: PipelineVersion) -> Option<Arc<PipelineDefinition>> {
        self.definitions.get(&version).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Item;
    use crate::stages::{StageOptions, StageOutcome};
    use async_trait::async_trait;

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
            unreachable!("definition tests never execute stages")
        }
    }

    fn leg(name: &'static str, required: ItemStatus, output: ItemStatus) -> Arc<dyn Stage> {
        Arc::new(LegStage {
            name,
            required,
            output,
        })
    }

    #[test]
    fn valid_chain_builds_and_ranks() {
        let def = PipelineDefinition::new(
            PipelineVersion::V2,
            vec![
                leg("download", ItemStatus::New, ItemStatus::Downloaded),
                leg("transcribe", ItemStatus::Downloaded, ItemStatus::Transcribed),
            ],
        )
        .unwrap();

        assert_eq!(def.rank(ItemStatus::New), Some(0));
        assert_eq!(def.rank(ItemStatus::Downloaded), Some(1));
        assert_eq!(def.rank(ItemStatus::Transcribed), Some(2));
        assert_eq!(def.rank(ItemStatus::Published), None);
        assert!(def.stage("transcribe").is_some());
        assert!(def.stage("publish").is_none());
    }

    #[test]
    fn broken_chain_is_rejected() {
        let err = PipelineDefinition::new(
            PipelineVersion::V2,
            vec![
                leg("download", ItemStatus::New, ItemStatus::Downloaded),
                leg("translate", ItemStatus::Transcribed, ItemStatus::Translated),
            ],
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::Validation { .. }));
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        let err = PipelineDefinition::new(PipelineVersion::V1, Vec::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));
    }

    #[test]
    fn repeated_status_is_rejected() {
        let err = PipelineDefinition::new(
            PipelineVersion::V2,
            vec![
                leg("download", ItemStatus::New, ItemStatus::Downloaded),
                leg("redownload", ItemStatus::Downloaded, ItemStatus::New),
            ],
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::Validation { .. }));
    }

    #[test]
    fn set_selects_by_version() {
        let set = PipelineSet::new().register(
            PipelineDefinition::new(
                PipelineVersion::V1,
                vec![leg("download", ItemStatus::New, ItemStatus::Downloaded)],
            )
            .unwrap(),
        );

        assert!(set.for_version(PipelineVersion::V1).is_some());
        assert!(set.for_version(PipelineVersion::V2).is_none());
    }
}
