//! OpenAI-compatible chat completion for open-ended questions.

use super::http::{check_status, v1_endpoint};
use crate::config::LlmConfig;
use crate::error::{AuraError, Result};
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Build the JSON request body for `/v1/chat/completions`.
#[must_use]
pub fn build_completions_request(config: &LlmConfig, prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "model": config.model,
        "messages": [
            {"role": "system", "content": config.system_prompt},
            {"role": "user", "content": prompt},
        ],
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
        "stream": false,
    })
}

/// Non-streaming chat client.
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: LlmConfig) {
        self.config = config;
    }

    fn endpoint(&self) -> String {
        v1_endpoint(&self.config.api_url, "chat/completions")
    }

    /// Ask a single question and return the trimmed reply.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Http`] on transport or status failures and
    /// [`AuraError::Llm`] when the reply is empty or malformed.
    pub async fn ask(&self, api_key: &str, prompt: &str) -> Result<String> {
        let url = self.endpoint();
        debug!(model = %self.config.model, "llm request");
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&build_completions_request(&self.config, prompt))
            .send()
            .await?;
        let body: CompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AuraError::Llm(format!("malformed completion: {e}")))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_owned())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AuraError::Llm("empty completion".into()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_model_and_limits() {
        let cfg = LlmConfig::default();
        let body = build_completions_request(&cfg, "Who painted the Mona Lisa?");
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["temperature"], 0.6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Who painted the Mona Lisa?");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let cfg = LlmConfig {
            api_url: "http://localhost:8080/".into(),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(reqwest::Client::new(), cfg);
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
