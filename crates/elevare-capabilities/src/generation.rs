use crate::backends::claude::ClaudeBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::{BackendError, LlmBackend};
use crate::capability::TextGenerator;
use crate::config::{GenerationConfig, GenerationProvider};
use async_trait::async_trait;
use elevare_core::CapabilityError;
use tracing::debug;

pub(crate) fn select_backend(config: GenerationConfig) -> Result<Box<dyn LlmBackend>, BackendError> {
    let backend: Box<dyn LlmBackend> = match config.provider {
        GenerationProvider::Claude => Box::new(ClaudeBackend::new(config)?),
        GenerationProvider::OpenAi | GenerationProvider::OpenRouter | GenerationProvider::Groq => {
            Box::new(OpenAiBackend::new(config)?)
        }
    };
    Ok(backend)
}

/// [`TextGenerator`] backed by a chat-completion provider.
pub struct LlmGenerator {
    backend: Box<dyn LlmBackend>,
    system_prompt: Option<String>,
}

impl LlmGenerator {
    pub fn new(config: GenerationConfig) -> Result<Self, CapabilityError> {
        let backend = select_backend(config).map_err(|e| CapabilityError::Generation(e.to_string()))?;
        Ok(Self::from_backend(backend))
    }

    /// Create from a pre-built backend (for custom providers).
    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self {
            backend,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError> {
        debug!(prompt_len = prompt.len(), "Generating text");
        self.backend
            .complete(self.system_prompt.as_deref(), prompt, false)
            .await
            .map_err(|e| CapabilityError::Generation(e.to_string()))
    }
}
