//! LLM Provider Abstraction
//!
//! The question pipeline only needs one capability from a language model:
//! turn a prompt into a completion. This crate defines that capability as the
//! [`LlmProvider`] trait and ships three implementations:
//!
//! - [`ollama::OllamaProvider`]: a local Ollama server (`/api/generate`)
//! - [`claude::ClaudeProvider`]: Anthropic's Messages API
//! - [`mock::MockProvider`]: canned responses for deterministic tests

pub mod claude;
pub mod mock;
pub mod ollama;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// API key not found or invalid
    #[error("API key error: {0}")]
    ApiKey(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: retry after {retry_after_ms}ms")]
    RateLimit { retry_after_ms: u64 },

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The call did not finish in time
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// Provider-specific error
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else {
            LlmError::Http(e.to_string())
        }
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Sampling configuration shared by the HTTP providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier (e.g., "gemma", "claude-sonnet-4-20250514")
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for sampling (0.0 - 1.0)
    pub temperature: Option<f32>,

    /// Per-request timeout enforced by the HTTP client
    pub request_timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: ollama::DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            temperature: Some(0.1),
            request_timeout: None,
        }
    }
}

impl LlmConfig {
    /// Create config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set max tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the HTTP request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// A text-completion backend: `generate(prompt) -> text`.
///
/// Implementations must be thread-safe. A call either returns the complete
/// completion text or an [`LlmError`]; partial output is never returned.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "Ollama", "Claude")
    fn name(&self) -> &str;

    /// Get the current model being used
    fn model(&self) -> &str;

    /// Check if the provider is configured and ready
    fn is_ready(&self) -> bool;

    /// Complete a single prompt.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Run `provider.generate` under a deadline.
///
/// Expiry is reported as [`LlmError::Timeout`], the same as any other
/// generation failure.
pub async fn generate_within(
    provider: &dyn LlmProvider,
    prompt: &str,
    limit: Option<Duration>,
) -> Result<String, LlmError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, provider.generate(prompt))
            .await
            .map_err(|_| LlmError::Timeout(limit))?,
        None => provider.generate(prompt).await,
    }
}

/// Which backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    Claude,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "claude" | "anthropic" => Some(Self::Claude),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Claude => "claude",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
