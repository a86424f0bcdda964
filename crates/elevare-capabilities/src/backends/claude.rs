use super::{http_client, BackendError, LlmBackend};
use crate::config::GenerationConfig;
use async_trait::async_trait;
use serde_json::{json, Value};

const JSON_ONLY: &str = "Respond with a single JSON object and nothing else.";

/// Claude (Anthropic) messages API backend.
pub struct ClaudeBackend {
    config: GenerationConfig,
    api_key: String,
    http: reqwest::Client,
}

impl ClaudeBackend {
    pub fn new(config: GenerationConfig) -> Result<Self, BackendError> {
        Ok(Self {
            api_key: config.resolved_api_key(),
            http: http_client(config.timeout_secs)?,
            config,
        })
    }
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
        json_mode: bool,
    ) -> Result<String, BackendError> {
        let url = format!("{}/v1/messages", self.config.base_url());

        let mut body = json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        // The messages API has no JSON mode; ask for it in the system prompt.
        let system = match (system_prompt, json_mode) {
            (Some(sys), true) => Some(format!("{sys}\n\n{JSON_ONLY}")),
            (Some(sys), false) => Some(sys.to_string()),
            (None, true) => Some(JSON_ONLY.to_string()),
            (None, false) => None,
        };
        if let Some(sys) = system {
            body["system"] = json!(sys);
        }

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                provider: "Claude",
                status: status.as_u16(),
                body,
            });
        }

        let resp_body: Value = resp.json().await?;
        parse_claude_response(&resp_body)
    }
}

fn parse_claude_response(body: &Value) -> Result<String, BackendError> {
    let text: String = body["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(BackendError::Empty("Claude"))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "world"}
            ]
        });
        assert_eq!(parse_claude_response(&body).unwrap(), "Hello, world");
    }

    #[test]
    fn missing_content_is_empty() {
        assert!(parse_claude_response(&json!({})).is_err());
    }
}
