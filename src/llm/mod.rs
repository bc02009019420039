use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::LlmConfig;

pub type LlmResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Completes a conversation. `config` may override `model`, `max_tokens` and `temperature`.
    async fn generate(&self, messages: &[ChatMessage], config: &Value) -> LlmResult<String>;
}

pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIClient {
    pub fn new(api_key: Option<String>, base_url: Option<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            max_tokens: 800,
            temperature: 0.3,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        let mut client = Self::new(
            config.api_key.clone(),
            Some(config.base_url.clone()),
            config.model.clone(),
        );
        client.max_tokens = config.max_tokens;
        client.temperature = config.temperature;
        client
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, messages: &[ChatMessage], config: &Value) -> Value {
        let model = config
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&self.model);
        let max_tokens = config
            .get("max_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(self.max_tokens as u64);
        let temperature = config
            .get("temperature")
            .and_then(Value::as_f64)
            .unwrap_or(self.temperature as f64);

        serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        })
    }
}

/// Some reasoning models prefix their answer with a channel marker; keep only the final part.
pub fn strip_reasoning(raw: &str) -> String {
    let end_token = "final<|message|>";
    match raw.find(end_token) {
        Some(pos) => raw[(pos + end_token.len())..].to_string(),
        None => raw.to_string(),
    }
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    async fn generate(&self, messages: &[ChatMessage], config: &Value) -> LlmResult<String> {
        let mut request = self
            .client
            .post(self.completions_url())
            .json(&self.request_body(messages, config));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM endpoint returned {}: {}", status, body);
            return Err(format!("LLM endpoint returned {}", status).into());
        }

        let result: Value = response.json().await?;
        let raw_content = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or("LLM response has no message content")?;
        debug!("LLM completion: {} chars", raw_content.len());

        Ok(strip_reasoning(raw_content).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 256,
            temperature: 0.2,
        }
    }

    #[test]
    fn test_strip_reasoning() {
        assert_eq!(strip_reasoning("plain answer"), "plain answer");
        assert_eq!(
            strip_reasoning("analysis<|channel|>final<|message|>Hello"),
            "Hello"
        );
    }

    #[test]
    fn test_request_body_overrides() {
        let client = OpenAIClient::from_config(&config("http://localhost/v1/".to_string()));
        assert_eq!(client.completions_url(), "http://localhost/v1/chat/completions");

        let body = client.request_body(
            &[ChatMessage::user("hi")],
            &serde_json::json!({"max_tokens": 10}),
        );
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 10);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_generate_posts_chat_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":" Hi there "}}]}"#)
            .create_async()
            .await;

        let client = OpenAIClient::from_config(&config(format!("{}/v1", server.url())));
        let reply = client
            .generate(
                &[ChatMessage::system("be brief"), ChatMessage::user("hello")],
                &Value::Null,
            )
            .await
            .unwrap();

        assert_eq!(reply, "Hi there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_reports_upstream_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = OpenAIClient::from_config(&config(server.url()));
        let err = client
            .generate(&[ChatMessage::user("hello")], &Value::Null)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
