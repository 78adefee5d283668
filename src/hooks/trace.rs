// src/hooks/trace.rs
// Telemetry hook: ships one trace event per request to an HTTP ingestion
// endpoint
//
// Sink failures are suppressed here and logged, not reported as pipeline
// failures: losing a telemetry event must not break the request's
// confirmation chain. Real observer failures (persistence) do propagate;
// that suppression is specific to this hook's own sink.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Hook, HookError};
use crate::llm::RequestContext;
use crate::utils::preview;

const SINK_TIMEOUT: Duration = Duration::from_secs(5);
const PREVIEW_CHARS: usize = 2000;

/// Where trace events go. With no URL configured the hook only emits a local
/// tracing event.
#[derive(Debug, Clone, Default)]
pub struct TraceSinkConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

/// One telemetry event, as posted to the sink
#[derive(Debug, Serialize)]
struct TraceEvent<'a> {
    trace_id: &'a str,
    name: &'a str,
    provider: Option<String>,
    model: Option<&'a str>,
    input: &'a str,
    output: Option<&'a str>,
    input_tokens: u32,
    output_tokens: u32,
    latency_ms: u64,
}

pub struct TraceHook {
    config: TraceSinkConfig,
    http: reqwest::Client,
}

impl TraceHook {
    pub fn new(config: TraceSinkConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SINK_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http }
    }

    async fn post_event(&self, url: &str, event: &TraceEvent<'_>) -> Result<(), reqwest::Error> {
        let mut request = self.http.post(url).json(event);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Hook for TraceHook {
    fn name(&self) -> &'static str {
        "trace"
    }

    async fn call(&self, ctx: &mut RequestContext) -> Result<(), HookError> {
        let input = ctx.prompt_text();
        let output = ctx.response_text();
        let usage = ctx.raw_response.as_ref().map(|e| e.usage).unwrap_or_default();

        let event = TraceEvent {
            trace_id: &ctx.trace_id,
            name: &ctx.operation,
            provider: ctx.provider.map(|p| p.to_string()),
            model: ctx.model.as_deref(),
            input: preview(&input, PREVIEW_CHARS),
            output: output.as_deref().map(|o| preview(o, PREVIEW_CHARS)),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            latency_ms: ctx.started.elapsed().as_millis() as u64,
        };

        match self.config.url.as_deref() {
            Some(url) => {
                // The sink eats its own failures; the pipeline never sees them
                if let Err(err) = self.post_event(url, &event).await {
                    warn!(trace_id = %ctx.trace_id, error = %err, "Trace sink unreachable");
                } else {
                    debug!(trace_id = %ctx.trace_id, "Trace event delivered");
                }
            }
            None => debug!(
                trace_id = %ctx.trace_id,
                operation = %ctx.operation,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                latency_ms = event.latency_ms,
                "Trace event (no sink configured)"
            ),
        }
        Ok(())
    }
}
