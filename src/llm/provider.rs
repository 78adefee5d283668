// src/llm/provider.rs
// Provider abstraction: the closed provider set, the adapter trait, and the
// failure taxonomy the retry policy classifies against

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::{ChatRequest, Envelope};

/// Supported LLM providers. The set is closed: a profile selects one of these
/// at resolution time and the choice is held as an opaque adapter handle for
/// the rest of the request, with no string dispatch in the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Gemini,
}

impl Provider {
    /// Parse provider from a profile's string value
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "gemini" | "vertex" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// Adapter failure taxonomy. The retry policy consults `is_retryable`; only
/// throttling, server-side, and network failures qualify.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider server error ({status}): {message}")]
    ProviderServer { status: u16, message: String },

    #[error("network timeout")]
    NetworkTimeout,

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("structured output unavailable: {0}")]
    StructuredOutputUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Whether the retry policy may attempt the call again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited(_)
                | LlmError::ProviderServer { .. }
                | LlmError::NetworkTimeout
                | LlmError::NetworkUnreachable(_)
        )
    }

    /// Classify a non-success HTTP status into the taxonomy
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => LlmError::RateLimited(body),
            s if (500..600).contains(&s) => LlmError::ProviderServer {
                status: s,
                message: body,
            },
            s => LlmError::Client {
                status: s,
                message: body,
            },
        }
    }

    /// Classify a reqwest transport failure into the taxonomy
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::NetworkTimeout
        } else if err.is_connect() {
            LlmError::NetworkUnreachable(err.to_string())
        } else {
            LlmError::Client {
                status: 0,
                message: err.to_string(),
            }
        }
    }
}

/// Trait every provider adapter implements. An adapter performs exactly one
/// network attempt per `send`; retries belong to `RetryPolicy`.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Send one chat request and return the normalized envelope
    async fn send(&self, request: ChatRequest) -> Result<Envelope, LlmError>;

    /// The provider this adapter talks to
    fn provider(&self) -> Provider;

    /// The model this adapter was constructed for
    fn model_name(&self) -> &str;
}

impl std::fmt::Debug for dyn LlmAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAdapter")
            .field("provider", &self.provider())
            .field("model", &self.model_name())
            .finish()
    }
}
