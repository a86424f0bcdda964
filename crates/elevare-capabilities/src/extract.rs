use crate::backends::LlmBackend;
use crate::capability::{ExtractionSchema, StructuredExtractor};
use crate::config::{ExtractionConfig, GenerationConfig};
use crate::generation::select_backend;
use async_trait::async_trait;
use elevare_core::CapabilityError;
use serde_json::Value;
use tracing::{debug, warn};

/// [`StructuredExtractor`] that asks a chat model for JSON matching a schema.
pub struct LlmExtractor {
    backend: Box<dyn LlmBackend>,
}

impl LlmExtractor {
    pub fn new(
        generation: &GenerationConfig,
        overrides: &ExtractionConfig,
    ) -> Result<Self, CapabilityError> {
        let backend = select_backend(generation.with_extraction(overrides))
            .map_err(|e| CapabilityError::Extraction(e.to_string()))?;
        Ok(Self::from_backend(backend))
    }

    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

fn system_prompt(schema: &ExtractionSchema) -> String {
    format!(
        "You convert text into structured data.\n\
         Produce a JSON object named {name}: {description}\n\
         It must validate against this JSON Schema:\n{schema}\n\
         Use only information found in the text. Reply with the JSON object only.",
        name = schema.name,
        description = schema.description,
        schema = schema.json_schema,
    )
}

/// Parses a model reply as JSON, tolerating a surrounding ```json fence.
pub fn parse_json_reply(reply: &str) -> Result<Value, serde_json::Error> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
}

#[async_trait]
impl StructuredExtractor for LlmExtractor {
    async fn extract(&self, text: &str, schema: &ExtractionSchema) -> Result<Value, CapabilityError> {
        debug!(schema = %schema.name, text_len = text.len(), "Extracting structured data");
        let reply = self
            .backend
            .complete(Some(&system_prompt(schema)), text, true)
            .await
            .map_err(|e| CapabilityError::Extraction(e.to_string()))?;

        let value = parse_json_reply(&reply).map_err(|e| {
            warn!(schema = %schema.name, error = %e, "Extraction reply is not JSON");
            CapabilityError::Extraction(format!("reply is not valid JSON: {e}"))
        })?;
        schema.check(&value).map_err(CapabilityError::Extraction)?;
        Ok(value)
    }
}
