//! Capability adapters for Elevare pipelines.
//!
//! A pipeline stage talks to the outside world through exactly one of four
//! capabilities: text generation, speech synthesis, deep research and
//! structured extraction. Each is a trait injected as `Arc<dyn …>` so tests
//! and offline deployments can swap in the deterministic [`stub`] versions.

pub mod backends;
pub mod capability;
pub mod config;
pub mod extract;
pub mod generation;
pub mod research;
pub mod stub;
pub mod synthesis;

pub use capability::{
    ExtractionSchema, ResearchBundle, Researcher, SpeechSynthesizer, StructuredExtractor,
    TextGenerator,
};
pub use config::{
    CapabilityConfig, ExtractionConfig, GenerationConfig, GenerationProvider, ResearchConfig,
    SynthesisConfig,
};
pub use extract::LlmExtractor;
pub use generation::LlmGenerator;
pub use research::HttpResearcher;
pub use synthesis::ElevenLabsSynthesizer;

use elevare_core::{ElevareError, ElevareResult};
use std::sync::Arc;
use tracing::info;

/// The capability set handed to the pipeline engine and the gateway.
#[derive(Clone)]
pub struct Capabilities {
    pub generator: Arc<dyn TextGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub researcher: Arc<dyn Researcher>,
    pub extractor: Arc<dyn StructuredExtractor>,
}

impl Capabilities {
    pub fn from_config(config: &CapabilityConfig) -> ElevareResult<Self> {
        if config.offline {
            info!("Using offline capabilities");
            return Ok(Self::offline());
        }

        let to_config = |e: elevare_core::CapabilityError| ElevareError::Config(e.to_string());
        info!(
            provider = ?config.generation.provider,
            model = %config.generation.model_id,
            "Capabilities configured"
        );
        Ok(Self {
            generator: Arc::new(LlmGenerator::new(config.generation.clone()).map_err(to_config)?),
            synthesizer: Arc::new(
                ElevenLabsSynthesizer::new(config.synthesis.clone()).map_err(to_config)?,
            ),
            researcher: Arc::new(HttpResearcher::new(config.research.clone()).map_err(to_config)?),
            extractor: Arc::new(
                LlmExtractor::new(&config.generation, &config.extraction).map_err(to_config)?,
            ),
        })
    }

    pub fn offline() -> Self {
        Self {
            generator: Arc::new(stub::StubGenerator::new()),
            synthesizer: Arc::new(stub::StubSynthesizer::new()),
            researcher: Arc::new(stub::StubResearcher::new()),
            extractor: Arc::new(stub::StubExtractor::new()),
        }
    }
}
