//! LLM client abstraction
//!
//! The generator only needs "system prompt + user prompt in, text out", so
//! the seam is a single async method. [`AnthropicClient`] talks to the
//! Anthropic Messages API; tests substitute their own implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{GenError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion and return the concatenated text output
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Connection settings for [`AnthropicClient`]
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub api_version: String,
    pub model: String,
    pub max_tokens: u32,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model: model.into(),
            max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    http_client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GenError::NotConfigured("Anthropic API key is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GenError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.config.model, url = %url, "Calling Anthropic Messages API");

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GenError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        extract_text(&body)
    }
}

/// Error message from an API error body, or the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

/// Concatenate the text blocks of a Messages API response
pub fn extract_text(body: &str) -> Result<String> {
    let response: MessagesResponse =
        serde_json::from_str(body).map_err(|e| GenError::Parse(e.to_string()))?;

    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text)
        .collect();

    if text.trim().is_empty() {
        return Err(GenError::Parse("Response contained no text".to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_joins_blocks() {
        let body = r#"{
            "id": "msg_1",
            "type": "message",
            "content": [
                {"type": "text", "text": "{\"a\":"},
                {"type": "tool_use", "id": "t", "name": "x", "input": {}},
                {"type": "text", "text": "1}"}
            ],
            "stop_reason": "end_turn"
        }"#;
        assert_eq!(extract_text(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_extract_text_empty_is_parse_error() {
        let body = r#"{"content": []}"#;
        assert!(matches!(extract_text(body), Err(GenError::Parse(_))));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(api_error_message(body), "invalid x-api-key");
        assert_eq!(api_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_empty_key_not_configured() {
        let config = AnthropicConfig::new("  ", "claude-sonnet-4-5", 1024);
        assert!(matches!(AnthropicClient::new(config), Err(GenError::NotConfigured(_))));
    }

    #[test]
    fn test_request_shape() {
        let request = MessagesRequest {
            model: "m",
            max_tokens: 10,
            system: "sys",
            messages: vec![RequestMessage {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["system"], "sys");
    }
}
