use super::{http_client, BackendError, LlmBackend};
use crate::config::{GenerationConfig, GenerationProvider};
use async_trait::async_trait;
use serde_json::{json, Value};

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI, Groq, OpenRouter and anything else speaking the
/// `/v1/chat/completions` API.
pub struct OpenAiBackend {
    config: GenerationConfig,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: GenerationConfig) -> Result<Self, BackendError> {
        Ok(Self {
            api_key: config.resolved_api_key(),
            http: http_client(config.timeout_secs)?,
            config,
        })
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.provider, GenerationProvider::OpenRouter) {
            request
                .header("HTTP-Referer", "https://github.com/elevare-ai/elevare")
                .header("X-Title", "Elevare")
        } else {
            request
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
        json_mode: bool,
    ) -> Result<String, BackendError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let mut messages = Vec::new();
        if let Some(sys) = system_prompt {
            messages.push(json!({"role": "system", "content": sys}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let mut body = json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": messages,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let resp = self
            .add_provider_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                provider: "OpenAI",
                status: status.as_u16(),
                body,
            });
        }

        let resp_body: Value = resp.json().await?;
        parse_openai_response(&resp_body)
    }
}

fn parse_openai_response(body: &Value) -> Result<String, BackendError> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .ok_or(BackendError::Empty("OpenAI"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "Hi"}}]});
        assert_eq!(parse_openai_response(&body).unwrap(), "Hi");
    }

    #[test]
    fn blank_content_is_empty() {
        let body = json!({"choices": [{"message": {"content": "  "}}]});
        assert!(matches!(
            parse_openai_response(&body),
            Err(BackendError::Empty(_))
        ));
    }
}
