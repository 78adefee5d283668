// src/llm/client.rs
// Request orchestrator: before-hooks, adapter send under retry, validation
// cascade, after-hooks
//
// One request moves through the phases in fixed order. Hook failures and
// exhausted sends are fatal; validation is not. A failure after the provider
// call succeeded means "a response may exist but is not confirmed delivered
// to all observers"; the caller sees the phase in the error.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::provider::{LlmAdapter, LlmError};
use super::validate::{ValidationOutcome, validate_and_repair};
use super::{ChatRequest, RequestContext, RetryPolicy};
use crate::config::{ProfileError, ProfileStore, ResolvedProfile};
use crate::hooks::{Hook, HookError, HookRegistry};

/// Pipeline phase, used to tag failures with where they happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    BeforeHooks,
    Sending,
    Validating,
    AfterHooks,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Resolving => "resolving",
            Phase::BeforeHooks => "before-hooks",
            Phase::Sending => "sending",
            Phase::Validating => "validating",
            Phase::AfterHooks => "after-hooks",
            Phase::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Fatal pipeline failure. Validation soft-misses are not represented here:
/// they surface as an absent `parsed` on an otherwise successful context.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("profile resolution failed: {0}")]
    Profile(#[from] ProfileError),

    #[error("adapter construction failed: {0}")]
    Adapter(#[source] LlmError),

    #[error("hook '{hook}' failed during {phase}: {source}")]
    Hook {
        phase: Phase,
        hook: &'static str,
        #[source]
        source: HookError,
    },

    #[error("provider call failed: {0}")]
    Send(#[from] LlmError),
}

/// Orchestrating client for one profile: adapter handle, retry policy, and
/// the resolved hook lists.
pub struct LlmClient {
    adapter: Arc<dyn LlmAdapter>,
    retry: RetryPolicy,
    before_hooks: Vec<Arc<dyn Hook>>,
    after_hooks: Vec<Arc<dyn Hook>>,
    default_temperature: Option<f32>,
}

impl LlmClient {
    /// Assemble a client directly from its parts
    pub fn new(
        adapter: Arc<dyn LlmAdapter>,
        retry: RetryPolicy,
        before_hooks: Vec<Arc<dyn Hook>>,
        after_hooks: Vec<Arc<dyn Hook>>,
    ) -> Self {
        Self {
            adapter,
            retry,
            before_hooks,
            after_hooks,
            default_temperature: None,
        }
    }

    /// Resolve a symbolic profile name into a ready client. This is the
    /// Resolving phase: any failure here is fatal and nothing has been sent.
    pub fn resolve(
        profile_name: &str,
        store: &ProfileStore,
        registry: &HookRegistry,
        factory: &super::AdapterFactory,
    ) -> Result<Self, PipelineError> {
        let profile = store.resolve(profile_name, registry)?;
        Self::from_profile(&profile, factory)
    }

    /// Build a client from an already-resolved profile
    pub fn from_profile(
        profile: &ResolvedProfile,
        factory: &super::AdapterFactory,
    ) -> Result<Self, PipelineError> {
        let adapter = factory
            .build(profile.provider, &profile.model)
            .map_err(PipelineError::Adapter)?;
        debug!(
            profile = %profile.name,
            provider = %profile.provider,
            model = %profile.model,
            "Profile resolved"
        );
        Ok(Self {
            adapter,
            retry: RetryPolicy::default(),
            before_hooks: profile.before_hooks.clone(),
            after_hooks: profile.after_hooks.clone(),
            default_temperature: profile.temperature,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run one request through the pipeline and hand the context back.
    ///
    /// On success the context carries `raw_response` and, when validation
    /// succeeded, `parsed`. Callers that requested a schema must check for an
    /// absent `parsed`: that is the soft validation failure, not an error.
    pub async fn execute(
        &self,
        mut ctx: RequestContext,
    ) -> Result<RequestContext, PipelineError> {
        ctx.provider = Some(self.adapter.provider());
        ctx.model = Some(self.adapter.model_name().to_string());
        if ctx.temperature.is_none() {
            ctx.temperature = self.default_temperature;
        }

        // BeforeHooks: a failure here means the adapter is never called
        self.fire(&self.before_hooks, Phase::BeforeHooks, &mut ctx)
            .await?;

        // Sending: retry wraps exactly the adapter call
        let request = ChatRequest {
            messages: ctx.messages.clone(),
            temperature: ctx.temperature,
            output_schema: ctx.output_schema.clone(),
        };
        let envelope = self
            .retry
            .run(|| self.adapter.send(request.clone()))
            .await?;
        debug_assert!(ctx.raw_response.is_none(), "raw_response written twice");
        ctx.raw_response = Some(envelope);

        // Validating: never fatal; soft-fails leave `parsed` unset
        let outcome = validate_and_repair(&mut ctx);
        if outcome == ValidationOutcome::SoftFailed {
            info!(
                trace_id = %ctx.trace_id,
                operation = %ctx.operation,
                "Validation soft-failed; continuing with raw response only"
            );
        }

        // AfterHooks: the provider call already succeeded, so a failure here
        // breaks confirmation, not the response itself
        self.fire(&self.after_hooks, Phase::AfterHooks, &mut ctx)
            .await?;

        info!(
            trace_id = %ctx.trace_id,
            operation = %ctx.operation,
            parsed = ctx.parsed.is_some(),
            "Request completed"
        );
        Ok(ctx)
    }

    /// Run one phase's hooks strictly in order; the first failure aborts the
    /// remainder of the phase.
    async fn fire(
        &self,
        hooks: &[Arc<dyn Hook>],
        phase: Phase,
        ctx: &mut RequestContext,
    ) -> Result<(), PipelineError> {
        for hook in hooks {
            if let Err(source) = hook.call(ctx).await {
                error!(
                    trace_id = %ctx.trace_id,
                    hook = hook.name(),
                    %phase,
                    error = %source,
                    "Hook failed, aborting phase"
                );
                return Err(PipelineError::Hook {
                    phase,
                    hook: hook.name(),
                    source,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Content, Envelope, Message, OutputSchema, Provider, Usage};
    use async_trait::async_trait;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Label {
        Positive,
        Neutral,
        Negative,
    }

    #[derive(Debug, Serialize, Deserialize, JsonSchema)]
    struct Verdict {
        sentiment: Label,
        confidence: f32,
    }

    /// Scripted adapter: pops one canned result per call
    struct ScriptedAdapter {
        calls: AtomicU32,
        script: Mutex<Vec<Result<Envelope, LlmError>>>,
    }

    impl ScriptedAdapter {
        fn new(script: Vec<Result<Envelope, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script),
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmAdapter for ScriptedAdapter {
        fn provider(&self) -> Provider {
            Provider::Anthropic
        }

        fn model_name(&self) -> &str {
            "scripted-model"
        }

        async fn send(&self, _request: ChatRequest) -> Result<Envelope, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .remove(0)
        }
    }

    fn text_envelope(text: &str) -> Envelope {
        Envelope {
            content: Content::Text(text.into()),
            model: "scripted-model".into(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(2),
        }
    }

    /// Hook that records its invocation order into the context's operation tag
    struct Recorder {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl Hook for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn call(&self, ctx: &mut RequestContext) -> Result<(), HookError> {
            ctx.operation.push(':');
            ctx.operation.push_str(self.name);
            if self.fail {
                return Err(HookError::Other(format!("{} exploded", self.name)));
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str) -> Arc<dyn Hook> {
        Arc::new(Recorder { name, fail: false })
    }

    fn failing(name: &'static str) -> Arc<dyn Hook> {
        Arc::new(Recorder { name, fail: true })
    }

    // ========================================================================
    // Phase sequencing
    // ========================================================================

    #[tokio::test]
    async fn test_happy_path_stamps_provider_and_parses() {
        let adapter = ScriptedAdapter::new(vec![Ok(text_envelope(
            r#"{"sentiment":"positive","confidence":0.95}"#,
        ))]);
        let client = LlmClient::new(adapter.clone(), fast_retry(3), vec![], vec![]);
        let ctx = RequestContext::new("op", vec![Message::user("I love this!")])
            .with_schema(OutputSchema::of::<Verdict>("Verdict"));

        let ctx = client.execute(ctx).await.unwrap();
        assert_eq!(ctx.provider, Some(Provider::Anthropic));
        assert_eq!(ctx.model.as_deref(), Some("scripted-model"));
        assert_eq!(adapter.call_count(), 1);
        let parsed = ctx.parsed.unwrap();
        assert_eq!(parsed["sentiment"], "positive");
        assert_eq!(parsed["confidence"], 0.95);
    }

    #[tokio::test]
    async fn test_hooks_run_in_declared_order() {
        let adapter = ScriptedAdapter::new(vec![Ok(text_envelope("{}"))]);
        let client = LlmClient::new(
            adapter,
            fast_retry(3),
            vec![recorder("a"), recorder("b")],
            vec![recorder("c")],
        );
        let ctx = RequestContext::new("op", vec![Message::user("x")]);
        let ctx = client.execute(ctx).await.unwrap();
        assert_eq!(ctx.operation, "op:a:b:c");
    }

    #[tokio::test]
    async fn test_before_hook_failure_aborts_without_sending() {
        let adapter = ScriptedAdapter::new(vec![Ok(text_envelope("{}"))]);
        let client = LlmClient::new(
            adapter.clone(),
            fast_retry(3),
            vec![failing("a"), recorder("b")],
            vec![],
        );
        let ctx = RequestContext::new("op", vec![Message::user("x")]);
        let err = client.execute(ctx).await.unwrap_err();

        // A failed, B never ran, adapter never called
        match err {
            PipelineError::Hook { phase, hook, .. } => {
                assert_eq!(phase, Phase::BeforeHooks);
                assert_eq!(hook, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(adapter.call_count(), 0);
    }

    #[tokio::test]
    async fn test_after_hook_failure_is_fatal_after_send() {
        let adapter = ScriptedAdapter::new(vec![Ok(text_envelope("{}"))]);
        let client = LlmClient::new(adapter.clone(), fast_retry(3), vec![], vec![failing("p")]);
        let ctx = RequestContext::new("op", vec![Message::user("x")]);
        let err = client.execute(ctx).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Hook {
                phase: Phase::AfterHooks,
                ..
            }
        ));
        assert_eq!(adapter.call_count(), 1);
    }

    // ========================================================================
    // Retry integration
    // ========================================================================

    #[tokio::test]
    async fn test_rate_limited_twice_then_success() {
        let adapter = ScriptedAdapter::new(vec![
            Err(LlmError::RateLimited("busy".into())),
            Err(LlmError::RateLimited("busy".into())),
            Ok(text_envelope(r#"{"sentiment":"positive","confidence":0.95}"#)),
        ]);
        let client = LlmClient::new(adapter.clone(), fast_retry(3), vec![], vec![]);
        let ctx = RequestContext::new("sentiment_analysis", vec![Message::user("I love this!")])
            .with_schema(OutputSchema::of::<Verdict>("Verdict"));

        let ctx = client.execute(ctx).await.unwrap();
        assert_eq!(adapter.call_count(), 3);
        assert_eq!(ctx.parsed.unwrap()["sentiment"], "positive");
    }

    #[tokio::test]
    async fn test_exhausted_retries_propagate_last_error() {
        let adapter = ScriptedAdapter::new(vec![
            Err(LlmError::ProviderServer {
                status: 502,
                message: "bad gateway".into(),
            }),
            Err(LlmError::ProviderServer {
                status: 502,
                message: "bad gateway".into(),
            }),
        ]);
        let client = LlmClient::new(adapter.clone(), fast_retry(2), vec![], vec![]);
        let ctx = RequestContext::new("op", vec![Message::user("x")]);
        let err = client.execute(ctx).await.unwrap_err();
        assert_eq!(adapter.call_count(), 2);
        assert!(matches!(
            err,
            PipelineError::Send(LlmError::ProviderServer { status: 502, .. })
        ));
    }

    // ========================================================================
    // Soft validation failure
    // ========================================================================

    #[tokio::test]
    async fn test_unparseable_output_is_not_fatal() {
        let raw = "sentiment: positive, sure about 0.9";
        let adapter = ScriptedAdapter::new(vec![Ok(text_envelope(raw))]);
        let client = LlmClient::new(adapter, fast_retry(3), vec![], vec![recorder("after")]);
        let ctx = RequestContext::new("op", vec![Message::user("x")])
            .with_schema(OutputSchema::of::<Verdict>("Verdict"));

        let ctx = client.execute(ctx).await.unwrap();
        assert!(ctx.parsed.is_none());
        assert_eq!(ctx.response_text().as_deref(), Some(raw));
        // After-hooks still ran
        assert!(ctx.operation.ends_with(":after"));
    }

    #[tokio::test]
    async fn test_profile_default_temperature_applies() {
        let adapter = ScriptedAdapter::new(vec![Ok(text_envelope("{}"))]);
        let mut client = LlmClient::new(adapter, fast_retry(3), vec![], vec![]);
        client.default_temperature = Some(0.2);
        let ctx = RequestContext::new("op", vec![Message::user("x")]);
        let ctx = client.execute(ctx).await.unwrap();
        assert_eq!(ctx.temperature, Some(0.2));
    }
}
