//! Claude Provider Implementation
//!
//! Implements the LlmProvider trait for Anthropic's Messages API using a
//! single non-streaming request per prompt.
//!
//! # Configuration
//!
//! - API key: Set via `ANTHROPIC_API_KEY` environment variable or passed directly
//! - Model: Defaults to claude-sonnet-4-20250514, configurable via `LlmConfig`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LlmConfig, LlmError, LlmProvider};

/// Anthropic API base URL
const API_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Default model to use
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// API version header
const API_VERSION: &str = "2023-06-01";

// =============================================================================
// API Request/Response Types
// =============================================================================

/// Request body for the Messages API
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

// =============================================================================
// Claude Provider
// =============================================================================

/// Claude API provider
pub struct ClaudeProvider {
    /// HTTP client
    client: Client,
    /// API key
    api_key: String,
    /// Sampling configuration
    config: LlmConfig,
}

impl ClaudeProvider {
    /// Create a new Claude provider with explicit API key
    pub fn new(api_key: impl Into<String>, config: LlmConfig) -> Result<Self, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            api_key: api_key.into(),
            config,
        })
    }

    /// Create a new Claude provider from environment variable
    ///
    /// Reads `ANTHROPIC_API_KEY` from environment
    pub fn from_env(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::ApiKey(
                "ANTHROPIC_API_KEY environment variable not set. \
                 Please set it or choose the ollama provider."
                    .to_string(),
            )
        })?;

        if api_key.is_empty() {
            return Err(LlmError::ApiKey("ANTHROPIC_API_KEY is empty".to_string()));
        }

        Self::new(api_key, config)
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        }
    }

    /// Concatenate the text blocks of a response
    fn response_text(response: MessagesResponse) -> String {
        response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "Claude"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/messages", API_BASE_URL))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                let retry_after_ms = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(|secs| secs * 1000)
                    .unwrap_or(60_000);
                return Err(LlmError::RateLimit { retry_after_ms });
            }

            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                provider: "Claude".to_string(),
                message: format!("HTTP {}: {}", status, error_text),
            });
        }

        let body: MessagesResponse = response.json().await?;
        debug!(stop_reason = ?body.stop_reason, "Claude completion received");
        Ok(Self::response_text(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request() {
        let provider =
            ClaudeProvider::new("test-key", LlmConfig::with_model(DEFAULT_MODEL).max_tokens(512))
                .unwrap();
        let json = serde_json::to_value(provider.build_request("What tables exist?")).unwrap();

        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "What tables exist?");
        assert!(provider.is_ready());
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{
                "content": [
                    {"type": "text", "text": "SELECT "},
                    {"type": "thinking", "thinking": "..."},
                    {"type": "text", "text": "1"}
                ],
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();

        assert_eq!(ClaudeProvider::response_text(body), "SELECT 1");
    }
}
