// src/llm/context.rs
// Mutable per-request envelope threaded through the pipeline phases

use std::time::Instant;
use uuid::Uuid;

use super::{Envelope, Message, OutputSchema, Provider};

/// Request/response context for one pipeline run.
///
/// Exclusively owned by the in-flight request; hooks receive it by mutable
/// reference, one at a time. `raw_response` is written at most once (by the
/// Sending phase) and `parsed` at most once (by the validator).
#[derive(Debug)]
pub struct RequestContext {
    /// Ordered chat messages sent to the provider
    pub messages: Vec<Message>,
    /// Sampling temperature in [0,1]; `None` uses the profile default
    pub temperature: Option<f32>,
    /// Symbolic operation tag for tracing and audit records
    pub operation: String,
    /// Schema the final content must conform to, if any
    pub output_schema: Option<OutputSchema>,

    /// Provider and model, stamped at resolution and immutable afterwards
    pub provider: Option<Provider>,
    pub model: Option<String>,

    /// Correlation id; generated per request when not supplied
    pub trace_id: String,
    /// When this context was created, for latency reporting
    pub started: Instant,

    /// The source text this request is about, if it concerns a stored entity
    pub text: Option<String>,
    /// Parent entity id (e.g. sentence id) for persistence
    pub parent_id: Option<i64>,
    /// Content fingerprint identifying the logical input
    pub fingerprint: Option<String>,
    /// Force re-analysis of an already-persisted result
    pub persist_override: bool,

    /// Provider response envelope, set exactly once by the Sending phase
    pub raw_response: Option<Envelope>,
    /// Canonical validated output, set by the validator or left `None`
    pub parsed: Option<serde_json::Value>,
}

impl RequestContext {
    pub fn new(operation: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: None,
            operation: operation.into(),
            output_schema: None,
            provider: None,
            model: None,
            trace_id: Uuid::new_v4().to_string(),
            started: Instant::now(),
            text: None,
            parent_id: None,
            fingerprint: None,
            persist_override: false,
            raw_response: None,
            parsed: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Attach the persisted subject: the analyzed text, its parent entity and
    /// fingerprint, and whether an existing result should be overwritten.
    pub fn with_subject(
        mut self,
        text: impl Into<String>,
        parent_id: Option<i64>,
        fingerprint: impl Into<String>,
    ) -> Self {
        self.text = Some(text.into());
        self.parent_id = parent_id;
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_persist_override(mut self, persist_override: bool) -> Self {
        self.persist_override = persist_override;
        self
    }

    /// Flattened prompt text for logging and audit records
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Response content rendered for previews, if a response exists
    pub fn response_text(&self) -> Option<String> {
        self.raw_response
            .as_ref()
            .map(|e| e.content.to_display_string())
    }
}
