//! The item record and its ordered status set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Processing status of an item.
///
/// Statuses form a strictly ordered sequence per pipeline version; an item
/// only moves forward except on explicit reversion by the review gate.
/// Failure is not a status: a failed item keeps its last good status plus a
/// non-empty `error_message`, so the status itself remains the resume point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Ingested, nothing done yet.
    New,
    /// Source media fetched.
    Downloaded,
    /// Transcript produced from source audio.
    Transcribed,
    /// Localized script produced from the transcript.
    Translated,
    /// Script checkpoint passed.
    ScriptApproved,
    /// Voiceover synthesized from the approved script.
    Voiced,
    /// Artwork rendered for the episode.
    Illustrated,
    /// Final video assembled.
    Assembled,
    /// Pre-publish checkpoint passed.
    ReleaseApproved,
    /// Uploaded; terminal.
    Published,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Downloaded => "downloaded",
            Self::Transcribed => "transcribed",
            Self::Translated => "translated",
            Self::ScriptApproved => "script_approved",
            Self::Voiced => "voiced",
            Self::Illustrated => "illustrated",
            Self::Assembled => "assembled",
            Self::ReleaseApproved => "release_approved",
            Self::Published => "published",
        };
        write!(f, "{name}")
    }
}

impl ItemStatus {
    /// Returns true if no pipeline can advance the item further.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published)
    }
}

/// Selects which ordered stage list applies to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVersion {
    /// Legacy pipeline without voiceover and artwork stages.
    V1,
    /// Current pipeline.
    #[default]
    V2,
}

impl fmt::Display for PipelineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
        }
    }
}

/// The unit of work progressing through the pipeline (a media episode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique item id.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Where the source media is fetched from.
    pub source_url: String,
    /// Current pipeline position.
    pub status: ItemStatus,
    /// Last failure surfaced to the operator; `None` while healthy.
    pub error_message: Option<String>,
    /// Number of failed executor passes recorded against the item.
    pub retry_count: u32,
    /// Which stage list applies.
    pub pipeline_version: PipelineVersion,
    /// Intended publication date; the batch runner's business ordering key.
    pub publish_at: DateTime<Utc>,
    /// Optimistic-concurrency counter bumped by every store update.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Creates a new item at the initial status.
    #[must_use]
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            source_url: source_url.into(),
            status: ItemStatus::New,
            error_message: None,
            retry_count: 0,
            pipeline_version: PipelineVersion::default(),
            publish_at: now,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the pipeline version.
    #[must_use]
    pub fn with_pipeline_version(mut self, version: PipelineVersion) -> Self {
        self.pipeline_version = version;
        self
    }

    /// Sets the intended publication date.
    #[must_use]
    pub fn with_publish_at(mut self, publish_at: DateTime<Utc>) -> Self {
        self.publish_at = publish_at;
        self
    }

    /// Returns true if the item carries an unresolved failure.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error_message.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_starts_fresh() {
        let item = Item::new("Episode 1", "https://media.example/ep1");

        assert_eq!(item.status, ItemStatus::New);
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.version, 0);
        assert!(!item.is_failed());
        assert_eq!(item.pipeline_version, PipelineVersion::V2);
    }

    #[test]
    fn only_published_is_terminal() {
        assert!(ItemStatus::Published.is_terminal());
        assert!(!ItemStatus::New.is_terminal());
        assert!(!ItemStatus::Assembled.is_terminal());
    }

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(ItemStatus::ScriptApproved.to_string(), "script_approved");
        assert_eq!(ItemStatus::New.to_string(), "new");
    }

    #[test]
    fn item_serialization_round_trip() {
        let item = Item::new("Episode 2", "https://media.example/ep2")
            .with_pipeline_version(PipelineVersion::V1);

        let json = serde_json::to_string(&item).expect("serialize");
        let back: Item = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(back.id, item.id);
        assert_eq!(back.pipeline_version, PipelineVersion::V1);
        assert_eq!(back.status, ItemStatus::New);
    }
}
