//! Ollama Provider Implementation
//!
//! Talks to a local Ollama server through the non-streaming
//! `POST /api/generate` endpoint.
//!
//! # Configuration
//!
//! - Base URL: defaults to `http://localhost:11434`, or `OLLAMA_HOST` (a bare
//!   `host:port` gets an `http://` scheme)
//! - Model: defaults to `gemma`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LlmConfig, LlmError, LlmProvider};

/// Default server address
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model to use
pub const DEFAULT_MODEL: &str = "gemma";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    done: bool,
}

/// Ollama API provider
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    config: LlmConfig,
}

impl OllamaProvider {
    /// Create a provider for the given server and sampling configuration
    pub fn new(base_url: Option<String>, config: LlmConfig) -> Result<Self, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let base_url = base_url
            .or_else(|| std::env::var("OLLAMA_HOST").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client,
            base_url: normalize_base_url(&base_url),
            config,
        })
    }

    /// Server address requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        }
    }
}

/// `OLLAMA_HOST` is conventionally `host:port` without a scheme.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        !self.config.model.is_empty()
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                provider: "Ollama".to_string(),
                message: format!("HTTP {}: {}", status, error_text),
            });
        }

        let body: GenerateResponse = response.json().await?;
        debug!(
            model = %self.config.model,
            done = body.done,
            chars = body.response.len(),
            "Ollama completion received"
        );
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let provider = OllamaProvider::new(
            Some("http://ollama:11434/".to_string()),
            LlmConfig::with_model("gemma").max_tokens(64),
        )
        .unwrap();

        assert_eq!(provider.base_url(), "http://ollama:11434");

        let json = serde_json::to_value(provider.build_request("Classify this")).unwrap();
        assert_eq!(json["model"], "gemma");
        assert_eq!(json["prompt"], "Classify this");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 64);
    }

    #[test]
    fn test_base_url_without_scheme() {
        assert_eq!(normalize_base_url("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(normalize_base_url("ollama:11434/"), "http://ollama:11434");
        assert_eq!(normalize_base_url("https://gpu.internal"), "https://gpu.internal");

        let provider =
            OllamaProvider::new(Some("127.0.0.1:9".to_string()), LlmConfig::with_model("gemma"))
                .unwrap();
        assert_eq!(provider.base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn test_response_parsing() {
        let body: GenerateResponse =
            serde_json::from_str(r#"{"model":"gemma","response":"SQL_QUERY","done":true}"#)
                .unwrap();
        assert_eq!(body.response, "SQL_QUERY");
        assert!(body.done);
    }
}
