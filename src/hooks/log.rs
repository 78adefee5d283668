// src/hooks/log.rs
// Request/response preview logging

use async_trait::async_trait;
use tracing::info;

use super::{Hook, HookError};
use crate::llm::RequestContext;
use crate::utils::preview;

const PREVIEW_CHARS: usize = 200;

/// Logs a short preview of the prompt, and of the response once one exists.
/// Safe to place in both phases.
pub struct LogHook;

#[async_trait]
impl Hook for LogHook {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn call(&self, ctx: &mut RequestContext) -> Result<(), HookError> {
        match ctx.response_text() {
            Some(response) => info!(
                trace_id = %ctx.trace_id,
                operation = %ctx.operation,
                response_preview = preview(&response, PREVIEW_CHARS),
                "LLM response"
            ),
            None => info!(
                trace_id = %ctx.trace_id,
                operation = %ctx.operation,
                prompt_preview = preview(&ctx.prompt_text(), PREVIEW_CHARS),
                "LLM request"
            ),
        }
        Ok(())
    }
}
