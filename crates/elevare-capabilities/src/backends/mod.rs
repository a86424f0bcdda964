pub mod claude;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Failure talking to a chat-completion provider.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{0} returned no text")]
    Empty(&'static str),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Http(err.to_string())
    }
}

/// One single-turn completion against a provider.
///
/// Each provider (OpenAI-compatible, Claude) implements this trait; the
/// generator and extractor pick one from [`GenerationConfig`](crate::GenerationConfig).
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Completes `prompt`. With `json_mode` the provider is asked for a bare JSON object.
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
        json_mode: bool,
    ) -> Result<String, BackendError>;
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(BackendError::from)
}
