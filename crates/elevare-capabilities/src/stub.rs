//! Deterministic in-process capabilities.
//!
//! Used when the service runs with `offline = true` and throughout the test
//! suites. Every stub counts its calls so callers can assert memoization.

use crate::capability::{
    ExtractionSchema, ResearchBundle, Researcher, SpeechSynthesizer, StructuredExtractor,
    TextGenerator,
};
use async_trait::async_trait;
use elevare_core::CapabilityError;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

const MAX_LINE: usize = 120;

fn meaningful_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim().trim_start_matches(['#', '-', '*', ' ']).trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().take(MAX_LINE).collect())
        .collect()
}

#[derive(Default)]
pub struct StubGenerator {
    calls: AtomicUsize,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lines = meaningful_lines(prompt);
        let Some(first) = lines.first() else {
            return Err(CapabilityError::Generation("empty prompt".into()));
        };
        let mut out = format!("{first}\n");
        for line in lines.iter().skip(1).take(4) {
            out.push_str(&format!("- {line}\n"));
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct StubSynthesizer {
    calls: AtomicUsize,
}

impl StubSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(CapabilityError::Synthesis("nothing to say".into()));
        }
        // ID3 header followed by the text, enough for clients sniffing the type.
        let mut audio = b"ID3".to_vec();
        audio.extend_from_slice(text.as_bytes());
        Ok(audio)
    }
}

#[derive(Default)]
pub struct StubResearcher {
    calls: AtomicUsize,
}

impl StubResearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Researcher for StubResearcher {
    async fn research(&self, topic: &str) -> Result<ResearchBundle, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(CapabilityError::Research("no topic given".into()));
        }
        let slug: String = topic
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        Ok(ResearchBundle {
            report: format!(
                "# {topic}\n\n## Abstract\nAn introduction to {topic}.\n\n\
                 ## Introduction\n- **Background:** What {topic} is.\n- **Objective:** Understand {topic}.\n\n\
                 ## Content\n- **Key Points:**\n- Core ideas of {topic}\n- Where {topic} shows up\n\
                 - **Details/Steps:**\n1. Define {topic}\n2. Work an example\n\n\
                 ## Conclusion\n- **Summary:** {topic} in brief.\n\n\
                 ## References\n- https://en.wikipedia.org/wiki/{slug}\n"
            ),
            context: format!("Collected notes on {topic}."),
            sources: vec![format!("https://en.wikipedia.org/wiki/{slug}")],
            images: Vec::new(),
        })
    }
}

/// Fills every property of the schema from the lines of the input text.
#[derive(Default)]
pub struct StubExtractor {
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn fill(schema: &Value, lines: &[String], cursor: &mut usize) -> Value {
    match schema["type"].as_str() {
        Some("object") => {
            let mut object = Map::new();
            if let Some(properties) = schema["properties"].as_object() {
                for (name, property) in properties {
                    object.insert(name.clone(), fill(property, lines, cursor));
                }
            }
            Value::Object(object)
        }
        Some("array") => {
            let items = &schema["items"];
            let count = lines.len().clamp(1, 3);
            Value::Array((0..count).map(|_| fill(items, lines, cursor)).collect())
        }
        Some("integer") | Some("number") => json!(0),
        Some("boolean") => json!(false),
        _ => {
            let line = lines
                .get(*cursor % lines.len().max(1))
                .cloned()
                .unwrap_or_default();
            *cursor += 1;
            Value::String(line)
        }
    }
}

#[async_trait]
impl StructuredExtractor for StubExtractor {
    async fn extract(&self, text: &str, schema: &ExtractionSchema) -> Result<Value, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lines = meaningful_lines(text);
        if lines.is_empty() {
            return Err(CapabilityError::Extraction("nothing to extract from".into()));
        }
        let mut cursor = 0;
        let value = fill(&schema.json_schema, &lines, &mut cursor);
        schema.check(&value).map_err(CapabilityError::Extraction)?;
        Ok(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generator_is_deterministic() {
        let generator = StubGenerator::new();
        let a = generator.generate("Explain tides\nbriefly").await.unwrap();
        let b = generator.generate("Explain tides\nbriefly").await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("Explain tides"));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn extractor_fills_nested_schema() {
        let schema = ExtractionSchema::new(
            "Guide",
            "guide",
            json!({
                "type": "object",
                "properties": {
                    "topic": {"type": "string"},
                    "concepts": {"type": "array", "items": {"type": "string"}},
                    "meta": {"type": "object", "properties": {"level": {"type": "integer"}}}
                },
                "required": ["topic", "concepts", "meta"]
            }),
        );
        let value = StubExtractor::new()
            .extract("# Light\nPhotons\nWaves", &schema)
            .await
            .unwrap();
        assert_eq!(value["topic"], "Light");
        assert_eq!(value["concepts"].as_array().unwrap().len(), 3);
        assert_eq!(value["meta"]["level"], 0);
    }

    #[tokio::test]
    async fn researcher_rejects_blank_topic() {
        assert!(StubResearcher::new().research("  ").await.is_err());
    }
}
