// src/llm/gemini.rs
// Google Gemini generateContent adapter (non-streaming, structured-only)
//
// This adapter is configured for schema-constrained JSON output via
// response_mime_type + response_schema. It refuses requests without a schema
// instead of silently returning unstructured text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::provider::{LlmAdapter, LlmError, Provider};
use super::{ChatRequest, Content, Envelope, Message, Role, Usage};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Gemini API adapter
pub struct GeminiClient {
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key,
            model,
            http,
        }
    }

    /// Convert normalized messages: system prompts become the system
    /// instruction, assistant turns map to the "model" role.
    fn convert_messages(messages: &[Message]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let system_text = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let system_instruction = if system_text.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system_text }],
            })
        };

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
            .map(|m| GeminiContent {
                role: Some(match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                }),
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            })
            .collect();
        (system_instruction, contents)
    }
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Strip schema keys Gemini's OpenAPI-subset validator rejects.
fn sanitize_schema(mut schema: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

#[async_trait]
impl LlmAdapter for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: ChatRequest) -> Result<Envelope, LlmError> {
        if request.messages.is_empty() {
            return Err(LlmError::InvalidRequest("messages must be non-empty".into()));
        }
        let Some(schema) = request.output_schema.as_ref() else {
            return Err(LlmError::StructuredOutputUnavailable(
                "Gemini adapter requires an output schema".into(),
            ));
        };

        let (system_instruction, contents) = Self::convert_messages(&request.messages);

        let body = GeminiRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
                temperature: request.temperature,
                response_mime_type: "application/json",
                response_schema: sanitize_schema(schema.json_schema().clone()),
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        debug!(model = %self.model, schema = schema.name(), "Sending Gemini request");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), error_body));
        }

        let data: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let text = data
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| {
                LlmError::StructuredOutputUnavailable("Gemini returned no candidates".into())
            })?;

        // With response_mime_type=application/json the text must parse; a
        // non-JSON reply means the structured contract was not honored.
        let value: serde_json::Value = serde_json::from_str(&text).map_err(|_| {
            LlmError::StructuredOutputUnavailable("Gemini did not return parsed output".into())
        })?;

        Ok(Envelope {
            content: Content::Structured(value),
            model: data.model_version.unwrap_or_else(|| self.model.clone()),
            usage: data
                .usage_metadata
                .map(|u| Usage {
                    input_tokens: u.prompt_token_count,
                    output_tokens: u.candidates_token_count,
                })
                .unwrap_or_default(),
        })
    }
}
