// src/hooks/archive.rs
// Raw-call audit log: one JSONL line per completed provider call
//
// The append is plain std::fs file I/O, so it runs on the runtime's bounded
// blocking pool and is awaited before the next hook; sequential ordering is
// preserved while the scheduler stays unblocked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

use super::{Hook, HookError};
use crate::llm::{RequestContext, Usage};

/// One archived LLM call
#[derive(Debug, Serialize, Deserialize)]
pub struct LlmCall {
    pub trace_id: String,
    pub operation: String,
    pub output_model: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt: String,
    pub response_raw: Option<String>,
    pub response_parsed: Option<serde_json::Value>,
    pub usage: Usage,
    pub created_at: DateTime<Utc>,
}

/// Appends each call to a JSONL audit file.
pub struct ArchiveHook {
    path: PathBuf,
}

impl ArchiveHook {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn build_record(ctx: &RequestContext) -> LlmCall {
        LlmCall {
            trace_id: ctx.trace_id.clone(),
            operation: ctx.operation.clone(),
            output_model: ctx.output_schema.as_ref().map(|s| s.name().to_string()),
            provider: ctx.provider.map(|p| p.to_string()),
            model: ctx.model.clone(),
            prompt: ctx.prompt_text(),
            response_raw: ctx.response_text(),
            response_parsed: ctx.parsed.clone(),
            usage: ctx
                .raw_response
                .as_ref()
                .map(|e| e.usage)
                .unwrap_or_default(),
            created_at: Utc::now(),
        }
    }

    fn append_line(path: &std::path::Path, line: String) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{line}")
    }
}

#[async_trait]
impl Hook for ArchiveHook {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn call(&self, ctx: &mut RequestContext) -> Result<(), HookError> {
        if ctx.raw_response.is_none() {
            debug!(trace_id = %ctx.trace_id, "Archive hook skipped: no response yet");
            return Ok(());
        }

        let record = Self::build_record(ctx);
        let line = serde_json::to_string(&record)
            .map_err(|e| HookError::Other(format!("cannot serialize audit record: {e}")))?;

        let path = self.path.clone();
        let trace_id = ctx.trace_id.clone();
        tokio::task::spawn_blocking(move || Self::append_line(&path, line))
            .await
            .map_err(|e| HookError::Other(format!("audit task failed: {e}")))?
            .map_err(HookError::Audit)?;

        debug!(trace_id = %trace_id, path = %self.path.display(), "Call archived");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Content, Envelope, Message};

    fn ctx_with_response() -> RequestContext {
        let mut ctx = RequestContext::new("sentiment_analysis", vec![Message::user("I love this!")]);
        ctx.raw_response = Some(Envelope {
            content: Content::Text(r#"{"sentiment":"positive","confidence":0.95}"#.into()),
            model: "claude-haiku".into(),
            usage: Usage {
                input_tokens: 12,
                output_tokens: 9,
            },
        });
        ctx.parsed = Some(serde_json::json!({"sentiment": "positive", "confidence": 0.95}));
        ctx
    }

    #[tokio::test]
    async fn test_appends_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.jsonl");
        let hook = ArchiveHook::new(path.clone());

        let mut ctx = ctx_with_response();
        hook.call(&mut ctx).await.unwrap();
        hook.call(&mut ctx).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let record: LlmCall = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record.operation, "sentiment_analysis");
        assert_eq!(record.usage.input_tokens, 12);
        assert_eq!(record.response_parsed.unwrap()["sentiment"], "positive");
    }

    #[tokio::test]
    async fn test_skips_without_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.jsonl");
        let hook = ArchiveHook::new(path.clone());

        let mut ctx = RequestContext::new("op", vec![Message::user("x")]);
        hook.call(&mut ctx).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("calls.jsonl");
        let hook = ArchiveHook::new(path.clone());

        let mut ctx = ctx_with_response();
        hook.call(&mut ctx).await.unwrap();
        assert!(path.exists());
    }
}
