use async_trait::async_trait;
use elevare_core::CapabilityError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError>;
}

/// Turns text into spoken audio (`audio/mpeg` bytes).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, CapabilityError>;
}

/// Runs deep research on a topic. Long-running.
#[async_trait]
pub trait Researcher: Send + Sync {
    async fn research(&self, topic: &str) -> Result<ResearchBundle, CapabilityError>;
}

/// Extracts a JSON object shaped by `schema` from free text.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, text: &str, schema: &ExtractionSchema) -> Result<Value, CapabilityError>;
}

/// Everything one research call produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub report: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Target shape of a structured extraction: a named JSON Schema object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSchema {
    pub name: String,
    pub description: String,
    pub json_schema: Value,
}

impl ExtractionSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, json_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            json_schema,
        }
    }

    /// Top-level fields listed under `required`.
    pub fn required_fields(&self) -> Vec<&str> {
        self.json_schema["required"]
            .as_array()
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Checks that `value` is an object carrying every required field.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let Some(object) = value.as_object() else {
            return Err(format!("{} must be a JSON object", self.name));
        };
        let missing: Vec<&str> = self
            .required_fields()
            .into_iter()
            .filter(|field| object.get(*field).map_or(true, Value::is_null))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("{} is missing required fields: {}", self.name, missing.join(", ")))
        }
    }
}
