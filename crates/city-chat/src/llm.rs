//! LLM Client — OpenAI-compatible chat completions.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ChatError;

/// Client settings, loaded from the `[llm]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_retries: 1,
            timeout_ms: 15_000,
            temperature: 0.8,
            max_tokens: 800,
        }
    }
}

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// OpenAI or any server speaking the same chat completions API.
    OpenAiCompatible { base_url: String, api_key: String },
    /// No LLM available — all calls fail, callers fall back.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior message in a conversation with the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A request to the LLM.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    /// Conversation so far; the last entry is the newest user message.
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the server for a JSON object response.
    pub json_mode: bool,
}

impl LlmRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![ChatMessage::user(user)],
            max_tokens: 800,
            temperature: 0.8,
            json_mode: false,
        }
    }

    pub fn with_history(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system: system.into(),
            messages,
            max_tokens: 800,
            temperature: 0.8,
            json_mode: false,
        }
    }

    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    fn body(&self, model: &str) -> serde_json::Value {
        let mut messages = vec![json!({ "role": "system", "content": self.system })];
        messages.extend(
            self.messages
                .iter()
                .map(|m| json!({ "role": m.role, "content": m.content })),
        );
        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        if self.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

/// A response from the LLM.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub tokens_generated: u32,
    pub latency_ms: u64,
    pub model: String,
}

/// Routes requests to the configured backend.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
    timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    #[must_use]
    pub fn new(provider: LlmProvider, config: &LlmConfig) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            timeout: Duration::from_millis(config.timeout_ms),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Build from config; no API key means no backend.
    #[must_use]
    pub fn from_config(config: &LlmConfig, api_key: Option<String>) -> Self {
        let provider = match api_key {
            Some(api_key) if !api_key.trim().is_empty() => LlmProvider::OpenAiCompatible {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key,
            },
            _ => LlmProvider::None,
        };
        Self::new(provider, config)
    }

    /// A client whose every call fails with `Unavailable`.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, &LlmConfig::default())
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// Apply the configured sampling settings to a request.
    pub fn tune(&self, mut request: LlmRequest) -> LlmRequest {
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }

    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, ChatError> {
        match &self.provider {
            LlmProvider::None => Err(ChatError::Unavailable("No LLM provider configured".into())),
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                self.generate_openai(base_url, api_key, request).await
            }
        }
    }

    async fn generate_openai(
        &self,
        base_url: &str,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, ChatError> {
        let url = format!("{}/v1/chat/completions", base_url);
        let body = request.body(&self.model);

        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!("Retrying LLM call (attempt {}/{})", attempt + 1, self.max_retries + 1);
            }

            let start = Instant::now();
            let result = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await;
            let latency_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: serde_json::Value = resp
                        .json()
                        .await
                        .map_err(|e| ChatError::Parse(e.to_string()))?;

                    let text = json["choices"][0]["message"]["content"]
                        .as_str()
                        .unwrap_or("")
                        .to_string();
                    let tokens = json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32;

                    return Ok(LlmResponse {
                        text,
                        tokens_generated: tokens,
                        latency_ms,
                        model: self.model.clone(),
                    });
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}", resp.status());
                    warn!("LLM API returned error: {}", last_error);
                }
                Err(e) => {
                    if e.is_timeout() {
                        warn!("LLM request timed out after {}ms", self.timeout.as_millis());
                    } else {
                        warn!("LLM request failed: {}", e);
                    }
                    last_error = e.to_string();
                }
            }
        }

        Err(ChatError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

/// Strip a surrounding markdown code fence, if the model added one.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_means_no_backend() {
        let config = LlmConfig::default();
        assert!(!LlmClient::from_config(&config, None).is_available());
        assert!(!LlmClient::from_config(&config, Some("  ".into())).is_available());
        assert!(LlmClient::from_config(&config, Some("sk-test".into())).is_available());
    }

    #[tokio::test]
    async fn test_none_provider_fails_fast() {
        let client = LlmClient::none();
        let result = client.generate(&LlmRequest::new("sys", "hi")).await;
        assert!(matches!(result, Err(ChatError::Unavailable(_))));
    }

    #[test]
    fn test_request_body_layout() {
        let request = LlmRequest::with_history(
            "be brief",
            vec![ChatMessage::user("hello"), ChatMessage::assistant("hey")],
        )
        .json();
        let body = request.body("gpt-test");
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  [1,2] "), "[1,2]");
        assert_eq!(strip_code_fence("```\n[]\n```"), "[]");
    }
}
