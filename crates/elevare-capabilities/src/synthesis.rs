use crate::backends::http_client;
use crate::capability::SpeechSynthesizer;
use crate::config::SynthesisConfig;
use async_trait::async_trait;
use elevare_core::CapabilityError;
use serde_json::json;
use tracing::debug;

/// ElevenLabs text-to-speech. Returns `audio/mpeg` bytes.
pub struct ElevenLabsSynthesizer {
    config: SynthesisConfig,
    api_key: String,
    http: reqwest::Client,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self, CapabilityError> {
        let http = http_client(config.timeout_secs)
            .map_err(|e| CapabilityError::Synthesis(e.to_string()))?;
        Ok(Self {
            api_key: config.resolved_api_key(),
            config,
            http,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, CapabilityError> {
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.voice_id
        );
        debug!(voice_id = %self.config.voice_id, text_len = text.len(), "Synthesizing speech");

        let resp = self
            .http
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&json!({"text": text, "model_id": self.config.model_id}))
            .send()
            .await
            .map_err(|e| CapabilityError::Synthesis(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapabilityError::Synthesis(format!(
                "ElevenLabs API error {status}: {body}"
            )));
        }

        let audio = resp
            .bytes()
            .await
            .map_err(|e| CapabilityError::Synthesis(e.to_string()))?;
        if audio.is_empty() {
            return Err(CapabilityError::Synthesis("ElevenLabs returned no audio".into()));
        }
        Ok(audio.to_vec())
    }
}
