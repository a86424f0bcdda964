use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    OpenAi,
    /// Groq cloud inference, OpenAI-compatible API.
    Groq,
    OpenRouter,
    Claude,
}

impl GenerationProvider {
    fn default_base_url(&self) -> &'static str {
        match self {
            GenerationProvider::OpenAi => "https://api.openai.com",
            GenerationProvider::Groq => "https://api.groq.com/openai",
            GenerationProvider::OpenRouter => "https://openrouter.ai/api",
            GenerationProvider::Claude => "https://api.anthropic.com",
        }
    }

    fn api_key_env(&self) -> &'static str {
        match self {
            GenerationProvider::OpenAi => "OPENAI_API_KEY",
            GenerationProvider::Groq => "GROQ_API_KEY",
            GenerationProvider::OpenRouter => "OPENROUTER_API_KEY",
            GenerationProvider::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: GenerationProvider,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Overrides applied to the generation settings for structured extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub model_id: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_voice_model")]
    pub model_id: String,
    #[serde(default = "default_elevenlabs_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_research_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_report_type")]
    pub report_type: String,
    #[serde(default = "default_max_subtopics")]
    pub max_subtopics: u32,
    #[serde(default = "default_research_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// Use deterministic in-process capabilities instead of remote services.
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

fn default_provider() -> GenerationProvider {
    GenerationProvider::OpenAi
}
fn default_model_id() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}
fn default_voice_model() -> String {
    "eleven_multilingual_v2".to_string()
}
fn default_elevenlabs_url() -> String {
    "https://api.elevenlabs.io".to_string()
}
fn default_research_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_report_type() -> String {
    "outline_report".to_string()
}
fn default_max_subtopics() -> u32 {
    3
}
fn default_research_timeout_secs() -> u64 {
    600
}

fn key_or_env(key: &str, env: &str) -> String {
    if key.is_empty() {
        std::env::var(env).unwrap_or_default()
    } else {
        key.to_string()
    }
}

impl GenerationConfig {
    pub fn base_url(&self) -> &str {
        match &self.api_base_url {
            Some(url) => url,
            None => self.provider.default_base_url(),
        }
    }

    /// The configured key, or the provider's environment variable when blank.
    pub fn resolved_api_key(&self) -> String {
        key_or_env(&self.api_key, self.provider.api_key_env())
    }

    /// Settings for extraction: these generation settings with the overrides applied.
    pub fn with_extraction(&self, overrides: &ExtractionConfig) -> GenerationConfig {
        let mut config = self.clone();
        if let Some(model_id) = &overrides.model_id {
            config.model_id = model_id.clone();
        }
        if let Some(max_tokens) = overrides.max_tokens {
            config.max_tokens = max_tokens;
        }
        config.temperature = 0.0;
        config
    }
}

impl SynthesisConfig {
    pub fn resolved_api_key(&self) -> String {
        key_or_env(&self.api_key, "ELEVENLABS_API_KEY")
    }
}

impl ResearchConfig {
    pub fn resolved_api_key(&self) -> String {
        key_or_env(&self.api_key, "RESEARCH_API_KEY")
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: default_voice_id(),
            model_id: default_voice_model(),
            api_base_url: default_elevenlabs_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_research_url(),
            api_key: String::new(),
            report_type: default_report_type(),
            max_subtopics: default_max_subtopics(),
            timeout_secs: default_research_timeout_secs(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_follows_provider_unless_overridden() {
        let mut config = GenerationConfig {
            provider: GenerationProvider::Groq,
            ..GenerationConfig::default()
        };
        assert_eq!(config.base_url(), "https://api.groq.com/openai");
        config.api_base_url = Some("http://127.0.0.1:9".into());
        assert_eq!(config.base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn extraction_overrides() {
        let base = GenerationConfig::default();
        let extraction = base.with_extraction(&ExtractionConfig {
            model_id: Some("gpt-4o".into()),
            max_tokens: None,
        });
        assert_eq!(extraction.model_id, "gpt-4o");
        assert_eq!(extraction.max_tokens, base.max_tokens);
        assert_eq!(extraction.temperature, 0.0);
    }

    #[test]
    fn explicit_key_wins_over_env() {
        let config = SynthesisConfig {
            api_key: "xi-test".into(),
            ..SynthesisConfig::default()
        };
        assert_eq!(config.resolved_api_key(), "xi-test");
    }

    #[test]
    fn empty_table_uses_defaults() {
        let config: CapabilityConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.offline);
        assert_eq!(config.generation.provider, GenerationProvider::OpenAi);
        assert_eq!(config.synthesis.voice_id, "21m00Tcm4TlvDq8ikWAM");
        assert_eq!(config.research.report_type, "outline_report");
        assert_eq!(config.research.max_subtopics, 3);
    }
}
