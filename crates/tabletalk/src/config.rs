//! Configuration parsing
//!
//! Reads settings from `~/.tabletalk/config.toml`. Every section and key is
//! optional; a missing file yields the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabletalk_llm::ProviderKind;

/// Error type for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root of `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,

    #[serde(default)]
    pub catalog: CatalogSection,

    #[serde(default)]
    pub execution: ExecutionSection,
}

/// `[llm]`: which generation backend answers prompts
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// "ollama" (default) or "claude"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name; the provider's default when absent
    #[serde(default)]
    pub model: Option<String>,

    /// Server address (Ollama only)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Deadline for one generation call (seconds)
    #[serde(default = "default_generation_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            timeout_seconds: default_generation_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmSection {
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        ProviderKind::parse(&self.provider).ok_or_else(|| ConfigError::Invalid {
            key: "llm.provider",
            reason: format!("unknown provider '{}' (expected ollama or claude)", self.provider),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// `[catalog]`: schema introspection
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSection {
    /// Most distinct values a text column may show and still get enum hints
    #[serde(default = "default_enum_hint_threshold")]
    pub enum_hint_threshold: usize,

    #[serde(default = "default_introspection_timeout")]
    pub introspection_timeout_seconds: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            enum_hint_threshold: default_enum_hint_threshold(),
            introspection_timeout_seconds: default_introspection_timeout(),
        }
    }
}

impl CatalogSection {
    pub fn introspection_timeout(&self) -> Duration {
        Duration::from_secs(self.introspection_timeout_seconds)
    }
}

/// `[execution]`: running generated queries
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    /// Reject anything but a single read statement
    #[serde(default = "default_read_only")]
    pub read_only: bool,

    #[serde(default = "default_execution_timeout")]
    pub timeout_seconds: u64,

    /// Rows of a result shown to the explainer
    #[serde(default = "default_context_row_limit")]
    pub context_row_limit: usize,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            read_only: default_read_only(),
            timeout_seconds: default_execution_timeout(),
            context_row_limit: default_context_row_limit(),
        }
    }
}

impl ExecutionSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_provider() -> String { "ollama".to_string() }
fn default_generation_timeout() -> u64 { 120 }
fn default_temperature() -> f32 { 0.1 }
fn default_max_tokens() -> u32 { 1024 }
fn default_enum_hint_threshold() -> usize { 10 }
fn default_introspection_timeout() -> u64 { 60 }
fn default_read_only() -> bool { true }
fn default_execution_timeout() -> u64 { 30 }
fn default_context_row_limit() -> usize { 50 }

impl AppConfig {
    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        self.llm.provider_kind()?;
        for (key, seconds) in [
            ("llm.timeout_seconds", self.llm.timeout_seconds),
            ("catalog.introspection_timeout_seconds", self.catalog.introspection_timeout_seconds),
            ("execution.timeout_seconds", self.execution.timeout_seconds),
        ] {
            if seconds == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be at least 1 second".to_string(),
                });
            }
        }
        if self.catalog.enum_hint_threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "catalog.enum_hint_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.execution.context_row_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "execution.context_row_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Default config location: `~/.tabletalk/config.toml`
pub fn default_config_path() -> PathBuf {
    tabletalk_logging::tabletalk_home().join("config.toml")
}

/// Load configuration from a file; a missing file means defaults.
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    if !config_path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(config_path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
