// src/llm/validate.rs
// Output validation cascade: strict parse, then schema-guided textual repair
//
// Runs once per context after the raw response is set. Never fatal: a cascade
// that fails leaves `parsed` unset and the original content untouched, and
// the caller decides what an absent result means.

use tracing::{debug, info, warn};

use super::{Content, RequestContext};

/// What the cascade did with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Strict stage accepted the payload
    Strict,
    /// Strict stage failed; the repair stage produced a valid object
    Repaired,
    /// Both stages failed; content untouched, `parsed` unset
    SoftFailed,
    /// No schema requested; text was valid JSON and was normalized
    Normalized,
    /// No schema requested and content was not JSON; left as-is
    Skipped,
}

/// Run the validation cascade over a context holding a raw response.
///
/// With a schema: strict coercion first; on a parse/validation error, the
/// repair stage extracts an embedded JSON object from the text and re-coerces.
/// Success at either stage sets `parsed` and rewrites the envelope content in
/// canonical form. Without a schema: best-effort JSON normalization only.
pub fn validate_and_repair(ctx: &mut RequestContext) -> ValidationOutcome {
    let Some(envelope) = ctx.raw_response.as_mut() else {
        return ValidationOutcome::Skipped;
    };

    let Some(schema) = ctx.output_schema.as_ref() else {
        return normalize_only(&mut envelope.content);
    };

    // Strict stage
    let strict = match &envelope.content {
        Content::Structured(value) => schema.coerce_value(value.clone()),
        Content::Text(raw) => schema.coerce_text(raw),
    };
    match strict {
        Ok(canonical) => {
            envelope.content = canonical_content(&envelope.content, &canonical);
            ctx.parsed = Some(canonical);
            debug!(schema = schema.name(), "Strict validation succeeded");
            return ValidationOutcome::Strict;
        }
        Err(err) => {
            debug!(schema = schema.name(), error = %err, "Strict validation failed");
        }
    }

    // Repair stage: only textual payloads can be repaired
    if let Content::Text(raw) = &envelope.content {
        if let Some(canonical) = repair_text(raw).and_then(|c| schema.coerce_text(&c).ok()) {
            envelope.content = Content::Text(canonical.to_string());
            ctx.parsed = Some(canonical);
            info!(schema = schema.name(), "Repair stage produced a valid object");
            return ValidationOutcome::Repaired;
        }
    }

    warn!(
        schema = schema.name(),
        operation = %ctx.operation,
        "Output failed validation; leaving raw content untouched"
    );
    ValidationOutcome::SoftFailed
}

/// Without a schema, normalize valid JSON text and ignore everything else.
fn normalize_only(content: &mut Content) -> ValidationOutcome {
    if let Content::Text(raw) = content {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
            *content = Content::Text(value.to_string());
            return ValidationOutcome::Normalized;
        }
    }
    ValidationOutcome::Skipped
}

/// Rewrite content as the canonical serialization, preserving its kind.
fn canonical_content(original: &Content, canonical: &serde_json::Value) -> Content {
    match original {
        Content::Text(_) => Content::Text(canonical.to_string()),
        Content::Structured(_) => Content::Structured(canonical.clone()),
    }
}

/// Pull a JSON object out of model chatter: strip markdown fences, then take
/// the outermost `{...}` span. Returns `None` when no candidate object exists.
fn repair_text(raw: &str) -> Option<String> {
    let stripped = strip_fences(raw);
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(stripped[start..=end].to_string())
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Envelope, Message, OutputSchema, Usage};
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};

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

    fn ctx_with_text(raw: &str, schema: Option<OutputSchema>) -> RequestContext {
        let mut ctx = RequestContext::new("test", vec![Message::user("x")]);
        if let Some(s) = schema {
            ctx = ctx.with_schema(s);
        }
        ctx.raw_response = Some(Envelope {
            content: Content::Text(raw.into()),
            model: "m".into(),
            usage: Usage::default(),
        });
        ctx
    }

    fn verdict_schema() -> OutputSchema {
        OutputSchema::of::<Verdict>("Verdict")
    }

    // ========================================================================
    // Strict stage
    // ========================================================================

    #[test]
    fn test_strict_success_skips_repair() {
        let mut ctx = ctx_with_text(
            r#"{"sentiment":"positive","confidence":0.9}"#,
            Some(verdict_schema()),
        );
        let outcome = validate_and_repair(&mut ctx);
        assert_eq!(outcome, ValidationOutcome::Strict);
        let parsed = ctx.parsed.unwrap();
        assert_eq!(parsed["sentiment"], "positive");
        assert_eq!(parsed["confidence"], 0.9);
    }

    #[test]
    fn test_strict_rewrites_canonical_content() {
        // Extra whitespace and field order disappear in the canonical form
        let mut ctx = ctx_with_text(
            "{ \"confidence\": 0.9 ,  \"sentiment\": \"positive\" }",
            Some(verdict_schema()),
        );
        validate_and_repair(&mut ctx);
        let text = ctx.raw_response.unwrap().content.to_display_string();
        assert_eq!(text, r#"{"sentiment":"positive","confidence":0.9}"#);
    }

    #[test]
    fn test_strict_structured_content() {
        let mut ctx = RequestContext::new("test", vec![])
            .with_schema(verdict_schema());
        ctx.raw_response = Some(Envelope {
            content: Content::Structured(
                serde_json::json!({"sentiment": "negative", "confidence": 0.4}),
            ),
            model: "m".into(),
            usage: Usage::default(),
        });
        assert_eq!(validate_and_repair(&mut ctx), ValidationOutcome::Strict);
        assert!(matches!(
            ctx.raw_response.unwrap().content,
            Content::Structured(_)
        ));
    }

    // ========================================================================
    // Repair stage
    // ========================================================================

    #[test]
    fn test_repair_extracts_fenced_json() {
        let raw = "```json\n{\"sentiment\":\"neutral\",\"confidence\":0.7}\n```";
        let mut ctx = ctx_with_text(raw, Some(verdict_schema()));
        assert_eq!(validate_and_repair(&mut ctx), ValidationOutcome::Repaired);
        assert_eq!(ctx.parsed.unwrap()["sentiment"], "neutral");
    }

    #[test]
    fn test_repair_extracts_embedded_object() {
        let raw = "Here is my answer: {\"sentiment\":\"positive\",\"confidence\":0.8} hope it helps";
        let mut ctx = ctx_with_text(raw, Some(verdict_schema()));
        assert_eq!(validate_and_repair(&mut ctx), ValidationOutcome::Repaired);
        let text = ctx.raw_response.unwrap().content.to_display_string();
        assert_eq!(text, r#"{"sentiment":"positive","confidence":0.8}"#);
    }

    #[test]
    fn test_repair_failure_leaves_content_untouched() {
        let raw = "sentiment: positive, sure about 0.9";
        let mut ctx = ctx_with_text(raw, Some(verdict_schema()));
        assert_eq!(validate_and_repair(&mut ctx), ValidationOutcome::SoftFailed);
        assert!(ctx.parsed.is_none());
        assert_eq!(ctx.raw_response.unwrap().content.to_display_string(), raw);
    }

    #[test]
    fn test_repair_invalid_object_soft_fails() {
        // Parses as JSON but fails the schema (unknown enum variant)
        let raw = "answer {\"sentiment\":\"ecstatic\",\"confidence\":0.9}";
        let mut ctx = ctx_with_text(raw, Some(verdict_schema()));
        assert_eq!(validate_and_repair(&mut ctx), ValidationOutcome::SoftFailed);
        assert!(ctx.parsed.is_none());
    }

    // ========================================================================
    // No schema: normalization only
    // ========================================================================

    #[test]
    fn test_no_schema_normalizes_json() {
        let mut ctx = ctx_with_text("{ \"a\" : 1 }", None);
        assert_eq!(validate_and_repair(&mut ctx), ValidationOutcome::Normalized);
        assert!(ctx.parsed.is_none());
        assert_eq!(
            ctx.raw_response.unwrap().content.to_display_string(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn test_no_schema_ignores_non_json() {
        let mut ctx = ctx_with_text("plain prose reply", None);
        assert_eq!(validate_and_repair(&mut ctx), ValidationOutcome::Skipped);
        assert_eq!(
            ctx.raw_response.unwrap().content.to_display_string(),
            "plain prose reply"
        );
    }

    #[test]
    fn test_no_response_is_skipped() {
        let mut ctx = RequestContext::new("test", vec![]);
        assert_eq!(validate_and_repair(&mut ctx), ValidationOutcome::Skipped);
    }

    // ========================================================================
    // repair_text helper
    // ========================================================================

    #[test]
    fn test_strip_fences_variants() {
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("{}"), "{}");
    }

    #[test]
    fn test_repair_text_no_object() {
        assert!(repair_text("nothing here").is_none());
        assert!(repair_text("} reversed {").is_none());
    }
}
