// src/hooks/mod.rs
// Observer hooks invoked around the provider call
//
// Hooks run strictly sequentially within a phase, in profile-declared order:
// they may mutate the shared context, so concurrent execution would race. A
// hook failure aborts the remaining hooks of that phase. Hooks whose body
// blocks (file I/O, sync clients) must push that work onto the runtime's
// bounded blocking pool with `spawn_blocking` and await it, which keeps the
// sequential ordering intact without stalling the scheduler.

mod archive;
mod log;
mod persist;
mod trace;

pub use archive::ArchiveHook;
pub use log::LogHook;
pub use persist::PersistHook;
pub use trace::{TraceHook, TraceSinkConfig};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::llm::RequestContext;

/// Hook failure. Aborts the current phase; the orchestrator reports which
/// hook failed and in which phase.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("persistence failed: {0}")]
    Persistence(#[from] anyhow::Error),

    #[error("audit write failed: {0}")]
    Audit(std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// An observer invoked before or after the provider call.
///
/// Before-hooks must not assume `ctx.raw_response` is populated; after-hooks
/// run once the response (and `parsed`, when validation succeeded) are set.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Symbolic name this hook registers under
    fn name(&self) -> &'static str;

    async fn call(&self, ctx: &mut RequestContext) -> Result<(), HookError>;
}

/// Startup-time mapping from symbolic hook name to hook instance.
///
/// Profiles reference hooks by name; resolution looks them up here. This
/// replaces any notion of loading observers by dotted module path: every
/// hook that can appear in a profile is registered explicitly.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<&'static str, Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook under its own name. Re-registering a name replaces the
    /// previous instance (latest wins), which tests use to stub built-ins.
    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.insert(hook.name(), hook);
    }

    /// Look up a hook by symbolic name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Hook>> {
        self.hooks.get(name).cloned()
    }

    /// Names currently registered, for diagnostics
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.hooks.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// The registry with every built-in hook registered: `log`, `trace`,
/// `archive`, and `persist`.
pub fn builtin_registry(
    pool: Arc<crate::db::DatabasePool>,
    env: &crate::config::EnvConfig,
) -> HookRegistry {
    let mut registry = HookRegistry::new();
    registry.register(Arc::new(LogHook));
    registry.register(Arc::new(TraceHook::new(TraceSinkConfig {
        url: env.trace_url.clone(),
        token: env.trace_token.clone(),
    })));
    registry.register(Arc::new(ArchiveHook::new(env.archive_path.clone())));
    registry.register(Arc::new(PersistHook::new(pool)));
    registry
}
