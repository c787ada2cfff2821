//! Provenance records and staleness markers.
//!
//! A provenance record is the stored evidence of what inputs and template
//! produced an artifact; it is valid proof of "no re-run needed" only while
//! no staleness marker exists for the artifact and recomputing the hashes
//! yields the same values. Markers and records live in the same store so a
//! stage re-run supersedes the record and flags its successor in one unit,
//! with no window where the two can disagree.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Evidence of what produced a derived artifact.
///
/// Superseded (replaced), never deleted, when the stage re-runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// The producing stage.
    pub stage: String,
    /// The item the artifact belongs to.
    pub item_id: Uuid,
    /// When the artifact was produced.
    pub timestamp: DateTime<Utc>,
    /// Digest of the template/prompt version used.
    pub prompt_hash: String,
    /// Digests of the canonicalized input artifact(s).
    pub input_hashes: Vec<String>,
    /// Paths of the produced artifact(s).
    pub output_files: Vec<String>,
    /// Cost of the producing call, in USD.
    pub cost_usd: f64,
    /// Tokens consumed, if reported.
    pub input_tokens: u64,
    /// Tokens produced, if reported.
    pub output_tokens: u64,
}

/// Flags an artifact as invalid regardless of hash match.
///
/// Written by an upstream stage that regenerated a dependency, or by a
/// reviewer requesting changes. Presence alone is the signal; the fields are
/// informational, except that `reason` doubles as reviewer feedback for the
/// next invocation of the producing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StalenessMarker {
    /// The artifact name being invalidated.
    pub artifact: String,
    /// The stage or checkpoint that wrote the marker.
    pub invalidated_by: String,
    /// When the marker was written.
    pub invalidated_at: DateTime<Utc>,
    /// Why, and for reviewer markers, what to change.
    pub reason: Option<String>,
}

impl StalenessMarker {
    /// Creates a marker for an artifact.
    #[must_use]
    pub fn new(artifact: impl Into<String>, invalidated_by: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            invalidated_by: invalidated_by.into(),
            invalidated_at: Utc::now(),
            reason: None,
        }
    }

    /// Attaches a reason (reviewer notes for changes-requested markers).
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Storage for provenance records and staleness markers.
#[async_trait]
pub trait ProvenanceStore: Send + Sync {
    /// Returns the current record for a stage/item, if any.
    async fn record(&self, item_id: Uuid, stage: &str) -> Option<ProvenanceRecord>;

    /// Writes a record, superseding any previous one for the same stage/item.
    async fn supersede(&self, record: ProvenanceRecord);

    /// Flags an artifact stale. A newer marker replaces an older one.
    async fn mark_stale(&self, item_id: Uuid, marker: StalenessMarker);

    /// Consumes and returns the marker for an artifact, if present.
    ///
    /// Consuming is deliberate: the first stage that observes the marker and
    /// decides to re-run removes it.
    async fn take_stale(&self, item_id: Uuid, artifact: &str) -> Option<StalenessMarker>;

    /// Returns the marker without consuming it. For previews and tests.
    async fn peek_stale(&self, item_id: Uuid, artifact: &str) -> Option<StalenessMarker>;
}

#[derive(Debug, Default)]
struct ProvenanceShelf {
    records: HashMap<(Uuid, String), ProvenanceRecord>,
    markers: HashMap<(Uuid, String), StalenessMarker>,
}

/// In-memory provenance store.
///
/// Records and markers share one lock, mirroring the single transactional
/// unit a persistent implementation would use.
#[derive(Debug, Default)]
pub struct InMemoryProvenanceStore {
    shelf: Mutex<ProvenanceShelf>,
}

impl InMemoryProvenanceStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProvenanceStore for InMemoryProvenanceStore {
    async fn record(&self, item_id: Uuid, stage: &str) -> Option<ProvenanceRecord> {
        self.shelf
            .lock()
            .records
            .get(&(item_id, stage.to_string()))
            .cloned()
    }

    async fn supersede(&self, record: ProvenanceRecord) {
        let key = (record.item_id, record.stage.clone());
        self.shelf.lock().records.insert(key, record);
    }

    async fn mark_stale(&self, item_id: Uuid, marker: StalenessMarker) {
        let key = (item_id, marker.artifact.clone());
        self.shelf.lock().markers.insert(key, marker);
    }

    async fn take_stale(&self, item_id: Uuid, artifact: &str) -> Option<StalenessMarker> {
        self.shelf
            .lock()
            .markers
            .remove(&(item_id, artifact.to_string()))
    }

    async fn peek_stale(&self, item_id: Uuid, artifact: &str) -> Option<StalenessMarker> {
        self.shelf
            .lock()
            .markers
            .get(&(item_id, artifact.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(item_id: Uuid, stage: &str, prompt_hash: &str) -> ProvenanceRecord {
        ProvenanceRecord {
            stage: stage.to_string(),
            item_id,
            timestamp: Utc::now(),
            prompt_hash: prompt_hash.to_string(),
            input_hashes: vec!["in".to_string()],
            output_files: vec!["out".to_string()],
            cost_usd: 0.01,
            input_tokens: 10,
            output_tokens: 20,
        }
    }

    #[tokio::test]
    async fn supersede_replaces_record() {
        let store = InMemoryProvenanceStore::new();
        let item_id = Uuid::new_v4();

        store.supersede(record(item_id, "translate", "v1")).await;
        store.supersede(record(item_id, "translate", "v2")).await;

        let current = store.record(item_id, "translate").await.expect("record");
        assert_eq!(current.prompt_hash, "v2");
    }

    #[tokio::test]
    async fn records_are_scoped_per_item() {
        let store = InMemoryProvenanceStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.supersede(record(a, "translate", "v1")).await;

        assert!(store.record(a, "translate").await.is_some());
        assert!(store.record(b, "translate").await.is_none());
    }

    #[tokio::test]
    async fn take_stale_consumes_marker() {
        let store = InMemoryProvenanceStore::new();
        let item_id = Uuid::new_v4();

        store
            .mark_stale(
                item_id,
                StalenessMarker::new("script.txt", "transcribe"),
            )
            .await;

        assert!(store.peek_stale(item_id, "script.txt").await.is_some());

        let marker = store.take_stale(item_id, "script.txt").await.expect("marker");
        assert_eq!(marker.invalidated_by, "transcribe");

        // Consumed on first take.
        assert!(store.take_stale(item_id, "script.txt").await.is_none());
        assert!(store.peek_stale(item_id, "script.txt").await.is_none());
    }

    #[tokio::test]
    async fn newer_marker_replaces_older() {
        let store = InMemoryProvenanceStore::new();
        let item_id = Uuid::new_v4();

        store
            .mark_stale(item_id, StalenessMarker::new("script.txt", "transcribe"))
            .await;
        store
            .mark_stale(
                item_id,
                StalenessMarker::new("script.txt", "script_review")
                    .with_reason("soften the intro"),
            )
            .await;

        let marker = store.take_stale(item_id, "script.txt").await.expect("marker");
        assert_eq!(marker.invalidated_by, "script_review");
        assert_eq!(marker.reason.as_deref(), Some("soften the intro"));
    }
}
