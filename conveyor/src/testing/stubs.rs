//! Scripted collaborators for testing the orchestration core.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::hashing::canonical_text;
use crate::stages::{Collaborator, CollaboratorError, ProduceRequest, Production};

/// A collaborator that records calls and returns configurable output.
pub struct StubCollaborator {
    template_version: String,
    output: Mutex<Vec<u8>>,
    cost_usd: f64,
    input_tokens: u64,
    output_tokens: u64,
    text_canonical: bool,
    call_count: Mutex<usize>,
    last_feedback: Mutex<Option<String>>,
    fail_next: Mutex<Option<String>>,
}

impl StubCollaborator {
    /// Creates a stub with a template version and empty output.
    #[must_use]
    pub fn new(template_version: impl Into<String>) -> Self {
        Self {
            template_version: template_version.into(),
            output: Mutex::new(Vec::new()),
            cost_usd: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            text_canonical: false,
            call_count: Mutex::new(0),
            last_feedback: Mutex::new(None),
            fail_next: Mutex::new(None),
        }
    }

    /// Sets the bytes every call produces.
    #[must_use]
    pub fn with_output(self, output: Vec<u8>) -> Self {
        *self.output.lock() = output;
        self
    }

    /// Sets the per-call cost, used for both the estimate and the charge.
    #[must_use]
    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    /// Sets reported token usage.
    #[must_use]
    pub fn with_tokens(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    /// Hash over [`canonical_text`] instead of raw bytes.
    #[must_use]
    pub fn canonicalizing_text(mut self) -> Self {
        self.text_canonical = true;
        self
    }

    /// Replaces the scripted output; the next run sees new content.
    pub fn set_output(&self, output: Vec<u8>) {
        *self.output.lock() = output;
    }

    /// Makes the next call fail with the given reason.
    pub fn fail_next(&self, reason: impl Into<String>) {
        *self.fail_next.lock() = Some(reason.into());
    }

    /// Number of live (non-dry-run) calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }

    /// Feedback passed to the most recent call.
    #[must_use]
    pub fn last_feedback(&self) -> Option<String> {
        self.last_feedback.lock().clone()
    }
}

#[async_trait]
impl Collaborator for StubCollaborator {
    fn template_version(&self) -> &str {
        &self.template_version
    }

    fn estimated_cost_usd(&self) -> f64 {
        self.cost_usd
    }

    fn canonicalize(&self, bytes: &[u8]) -> Vec<u8> {
        if self.text_canonical {
            canonical_text(bytes)
        } else {
            bytes.to_vec()
        }
    }

    async fn produce(&self, request: ProduceRequest) -> Result<Production, CollaboratorError> {
        if request.dry_run {
            return Ok(Production {
                output: b"placeholder".to_vec(),
                cost_usd: 0.0,
                input_tokens: 0,
                output_tokens: 0,
                detail: "placeholder manifest".to_string(),
            });
        }

        if let Some(reason) = self.fail_next.lock().take() {
            return Err(CollaboratorError::new(reason));
        }

        *self.call_count.lock() += 1;
        *self.last_feedback.lock() = request.feedback;

        let output = self.output.lock().clone();
        Ok(Production {
            detail: format!("produced {} bytes", output.len()),
            output,
            cost_usd: self.cost_usd,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        })
    }
}
