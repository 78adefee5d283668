// src/llm/schema.rs
// Type-erased output schema descriptor
//
// Built once from a typed output model, then carried through the request
// context so hooks and the validator stay object-safe. The coerce functions
// are monomorphized at construction: they parse, validate against the model,
// and re-serialize in canonical field order.

use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Schema descriptor for structured provider output.
///
/// `coerce_text` / `coerce_value` succeed only if the payload deserializes
/// into the originating model; the returned value is the model re-serialized,
/// which is what "canonical form" means here.
#[derive(Clone)]
pub struct OutputSchema {
    name: &'static str,
    json_schema: Arc<serde_json::Value>,
    coerce_text: fn(&str) -> Result<serde_json::Value, serde_json::Error>,
    coerce_value: fn(serde_json::Value) -> Result<serde_json::Value, serde_json::Error>,
}

impl OutputSchema {
    /// Build a descriptor for the typed output model `T`.
    pub fn of<T>(name: &'static str) -> Self
    where
        T: DeserializeOwned + Serialize + JsonSchema,
    {
        let root = schemars::schema_for!(T);
        let json_schema = serde_json::to_value(&root)
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        Self {
            name,
            json_schema: Arc::new(json_schema),
            coerce_text: coerce_text_impl::<T>,
            coerce_value: coerce_value_impl::<T>,
        }
    }

    /// Schema name, used as the forced tool name for tool-use providers
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The JSON Schema document, for provider-native structured output
    pub fn json_schema(&self) -> &serde_json::Value {
        &self.json_schema
    }

    /// Parse and validate raw text, returning the canonical value
    pub fn coerce_text(&self, raw: &str) -> Result<serde_json::Value, serde_json::Error> {
        (self.coerce_text)(raw)
    }

    /// Validate an already-structured value, returning the canonical value
    pub fn coerce_value(
        &self,
        value: serde_json::Value,
    ) -> Result<serde_json::Value, serde_json::Error> {
        (self.coerce_value)(value)
    }
}

impl std::fmt::Debug for OutputSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSchema")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn coerce_text_impl<T>(raw: &str) -> Result<serde_json::Value, serde_json::Error>
where
    T: DeserializeOwned + Serialize,
{
    let typed: T = serde_json::from_str(raw)?;
    serde_json::to_value(&typed)
}

fn coerce_value_impl<T>(value: serde_json::Value) -> Result<serde_json::Value, serde_json::Error>
where
    T: DeserializeOwned + Serialize,
{
    let typed: T = serde_json::from_value(value)?;
    serde_json::to_value(&typed)
}
