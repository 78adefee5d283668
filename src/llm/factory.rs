// src/llm/factory.rs
// Adapter construction from a resolved profile
//
// The provider set is closed: dispatch happens exactly once here, at
// resolution time, and the caller holds the result as an opaque handle.
// There is no fallback chain: a missing credential is an error, not an
// invitation to call a different provider.

use std::sync::Arc;

use super::anthropic::AnthropicClient;
use super::gemini::GeminiClient;
use super::provider::{LlmAdapter, LlmError, Provider};
use crate::config::ApiKeys;

/// Builds provider adapters from pre-loaded API keys
pub struct AdapterFactory {
    keys: ApiKeys,
}

impl AdapterFactory {
    pub fn new(keys: ApiKeys) -> Self {
        Self { keys }
    }

    pub fn from_env() -> Self {
        Self::new(ApiKeys::from_env())
    }

    /// Build the adapter for a provider/model pair
    pub fn build(&self, provider: Provider, model: &str) -> Result<Arc<dyn LlmAdapter>, LlmError> {
        let missing_key = || {
            LlmError::InvalidRequest(format!(
                "no API key for provider '{provider}': set {}",
                provider.api_key_env_var()
            ))
        };
        match provider {
            Provider::Anthropic => {
                let key = self.keys.anthropic.clone().ok_or_else(missing_key)?;
                Ok(Arc::new(AnthropicClient::new(key, model.to_string())))
            }
            Provider::Gemini => {
                let key = self.keys.gemini.clone().ok_or_else(missing_key)?;
                Ok(Arc::new(GeminiClient::new(key, model.to_string())))
            }
        }
    }
}
