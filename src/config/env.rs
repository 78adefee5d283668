// src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use std::path::PathBuf;
use tracing::{debug, warn};

/// API keys loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Anthropic API key (ANTHROPIC_API_KEY)
    pub anthropic: Option<String>,
    /// Gemini/Google API key (GEMINI_API_KEY or GOOGLE_API_KEY)
    pub gemini: Option<String>,
}

impl ApiKeys {
    /// Load API keys from environment variables (single source of truth)
    pub fn from_env() -> Self {
        let keys = Self {
            anthropic: read_key("ANTHROPIC_API_KEY"),
            gemini: read_key("GEMINI_API_KEY").or_else(|| read_key("GOOGLE_API_KEY")),
        };
        keys.log_status();
        keys
    }

    /// Check if any LLM provider is available
    pub fn has_llm_provider(&self) -> bool {
        self.anthropic.is_some() || self.gemini.is_some()
    }

    /// Log which API keys are available (without exposing values)
    fn log_status(&self) {
        let mut available = Vec::new();
        if self.anthropic.is_some() {
            available.push("Anthropic");
        }
        if self.gemini.is_some() {
            available.push("Gemini");
        }

        if available.is_empty() {
            warn!("No API keys configured - provider calls will fail at adapter construction");
        } else {
            debug!(keys = ?available, "API keys loaded");
        }
    }
}

/// Read a single env var, filtering empty values
fn read_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|k| !k.trim().is_empty())
}

/// Remaining process configuration read from the environment
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Database location (SENTIRA_DB, default ~/.sentira/sentira.db)
    pub db_path: PathBuf,
    /// Profile configuration file (SENTIRA_PROFILES, default ./profiles.toml)
    pub profiles_path: PathBuf,
    /// JSONL audit log for raw calls (SENTIRA_ARCHIVE, default ~/.sentira/llm_calls.jsonl)
    pub archive_path: PathBuf,
    /// Optional telemetry ingestion endpoint (SENTIRA_TRACE_URL)
    pub trace_url: Option<String>,
    /// Optional telemetry auth token (SENTIRA_TRACE_TOKEN)
    pub trace_token: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let home_dir = || {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".sentira")
        };
        Self {
            db_path: read_key("SENTIRA_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| home_dir().join("sentira.db")),
            profiles_path: read_key("SENTIRA_PROFILES")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("profiles.toml")),
            archive_path: read_key("SENTIRA_ARCHIVE")
                .map(PathBuf::from)
                .unwrap_or_else(|| home_dir().join("llm_calls.jsonl")),
            trace_url: read_key("SENTIRA_TRACE_URL"),
            trace_token: read_key("SENTIRA_TRACE_TOKEN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_keys_have_no_provider() {
        let keys = ApiKeys::default();
        assert!(!keys.has_llm_provider());
    }

    #[test]
    fn test_any_key_enables_provider() {
        let keys = ApiKeys {
            anthropic: Some("k".into()),
            gemini: None,
        };
        assert!(keys.has_llm_provider());
    }
}
