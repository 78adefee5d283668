// src/llm/anthropic.rs
// Anthropic Messages API adapter (non-streaming)
//
// Structured output rides on forced tool use: the output schema becomes the
// single tool's input_schema with tool_choice pinned to it, so the reply's
// tool_use block is an already-typed object. Without a schema the adapter
// returns plain text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::provider::{LlmAdapter, LlmError, Provider};
use super::{ChatRequest, Content, Envelope, Message, Role, Usage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Anthropic API adapter
pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key,
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            http,
        }
    }

    /// Split the normalized messages into Anthropic's shape: system prompts
    /// go in the top-level `system` field, the rest keep their roles.
    fn split_messages(messages: &[Message]) -> (Option<String>, Vec<WireMessage<'_>>) {
        let system_text = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let system = if system_text.is_empty() {
            None
        } else {
            Some(system_text)
        };

        let wire = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                },
                content: &m.content,
            })
            .collect();
        (system, wire)
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ToolDef<'a> {
    name: &'a str,
    description: String,
    input_schema: &'a serde_json::Value,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDef<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { input: serde_json::Value },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl LlmAdapter for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: ChatRequest) -> Result<Envelope, LlmError> {
        if request.messages.is_empty() {
            return Err(LlmError::InvalidRequest("messages must be non-empty".into()));
        }

        let (system, messages) = Self::split_messages(&request.messages);

        let (tools, tool_choice) = match request.output_schema.as_ref() {
            Some(schema) => (
                Some(vec![ToolDef {
                    name: schema.name(),
                    description: format!("Extract structured data as {}", schema.name()),
                    input_schema: schema.json_schema(),
                }]),
                Some(serde_json::json!({ "type": "tool", "name": schema.name() })),
            ),
            None => (None, None),
        };

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
            system,
            temperature: request.temperature,
            tools,
            tool_choice,
        };

        debug!(model = %self.model, structured = request.output_schema.is_some(), "Sending Anthropic request");

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), error_body));
        }

        let data: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let wants_structured = request.output_schema.is_some();
        let content = extract_content(data.content, wants_structured);

        Ok(Envelope {
            content,
            model: data.model,
            usage: Usage {
                input_tokens: data.usage.input_tokens,
                output_tokens: data.usage.output_tokens,
            },
        })
    }
}

/// Pick the response payload: the tool_use object when structured output was
/// requested and honored, otherwise the first text block. Free text under a
/// schema request is left for the validator to coerce.
fn extract_content(blocks: Vec<ContentBlock>, wants_structured: bool) -> Content {
    if wants_structured {
        for block in &blocks {
            if let ContentBlock::ToolUse { input } = block {
                return Content::Structured(input.clone());
            }
        }
    }
    for block in blocks {
        if let ContentBlock::Text { text } = block {
            return Content::Text(text);
        }
    }
    Content::Text(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Message splitting
    // ========================================================================

    #[test]
    fn test_split_messages_moves_system() {
        let messages = vec![
            Message::system("be terse"),
            Message::user("hello"),
            Message::assistant("hi"),
        ];
        let (system, wire) = AnthropicClient::split_messages(&messages);
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "user");
        assert_eq!(wire[1].role, "assistant");
    }

    #[test]
    fn test_split_messages_no_system() {
        let messages = vec![Message::user("hello")];
        let (system, wire) = AnthropicClient::split_messages(&messages);
        assert!(system.is_none());
        assert_eq!(wire.len(), 1);
    }

    // ========================================================================
    // Content extraction
    // ========================================================================

    #[test]
    fn test_extract_tool_use_when_structured() {
        let blocks = vec![
            ContentBlock::Text {
                text: "preamble".into(),
            },
            ContentBlock::ToolUse {
                input: serde_json::json!({"sentiment": "positive"}),
            },
        ];
        match extract_content(blocks, true) {
            Content::Structured(v) => assert_eq!(v["sentiment"], "positive"),
            other => panic!("expected structured content, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_text_fallback_under_schema() {
        let blocks = vec![ContentBlock::Text {
            text: "{\"a\":1}".into(),
        }];
        match extract_content(blocks, true) {
            Content::Text(t) => assert_eq!(t, "{\"a\":1}"),
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_text_ignores_tool_use_without_schema() {
        let blocks = vec![
            ContentBlock::ToolUse {
                input: serde_json::json!({}),
            },
            ContentBlock::Text {
                text: "plain".into(),
            },
        ];
        match extract_content(blocks, false) {
            Content::Text(t) => assert_eq!(t, "plain"),
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_empty_blocks() {
        match extract_content(vec![], true) {
            Content::Text(t) => assert!(t.is_empty()),
            other => panic!("expected empty text, got {other:?}"),
        }
    }

    // ========================================================================
    // Response deserialization
    // ========================================================================

    #[test]
    fn test_deserialize_response() {
        let raw = r#"{
            "id": "msg_01",
            "model": "claude-haiku",
            "content": [
                {"type": "text", "text": "hello"},
                {"type": "tool_use", "id": "tu_1", "name": "Verdict", "input": {"k": 1}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 5}
        }"#;
        let data: AnthropicResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(data.model, "claude-haiku");
        assert_eq!(data.content.len(), 2);
        assert_eq!(data.usage.input_tokens, 12);
        assert_eq!(data.usage.output_tokens, 5);
    }

    #[test]
    fn test_deserialize_unknown_block_type() {
        let raw = r#"{
            "model": "claude-haiku",
            "content": [{"type": "thinking", "thinking": "..."}]
        }"#;
        let data: AnthropicResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(data.content[0], ContentBlock::Other));
    }

    #[test]
    fn test_empty_messages_rejected() {
        let client = AnthropicClient::new("key".into(), "claude-haiku".into());
        let request = ChatRequest {
            messages: vec![],
            temperature: None,
            output_schema: None,
        };
        let err = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(client.send(request))
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn test_provider_and_model() {
        let client = AnthropicClient::new("key".into(), "claude-haiku".into());
        assert_eq!(client.provider(), Provider::Anthropic);
        assert_eq!(client.model_name(), "claude-haiku");
    }
}
