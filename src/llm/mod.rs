// src/llm/mod.rs
// LLM request pipeline: normalized wire types, provider adapters, retry,
// validation, and the orchestrating client

mod anthropic;
mod client;
mod context;
mod factory;
mod gemini;
mod provider;
mod retry;
mod schema;
pub mod validate;

pub use anthropic::AnthropicClient;
pub use client::{LlmClient, Phase, PipelineError};
pub use context::RequestContext;
pub use factory::AdapterFactory;
pub use gemini::GeminiClient;
pub use provider::{LlmAdapter, LlmError, Provider};
pub use retry::RetryPolicy;
pub use schema::OutputSchema;

use serde::{Deserialize, Serialize};

/// Message role in a chat exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage reported by a provider, normalized across providers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Response content: free text or provider-native structured output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Structured(serde_json::Value),
}

impl Content {
    /// Textual view of the content, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(t) => Some(t),
            Content::Structured(_) => None,
        }
    }

    /// Render the content for previews and audit records
    pub fn to_display_string(&self) -> String {
        match self {
            Content::Text(t) => t.clone(),
            Content::Structured(v) => v.to_string(),
        }
    }
}

/// Normalized response envelope returned by every adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub content: Content,
    pub model: String,
    pub usage: Usage,
}

/// One outbound provider request, as handed to an adapter
#[derive(Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub output_schema: Option<OutputSchema>,
}
