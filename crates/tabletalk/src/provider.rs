//! Builds the configured generation backend.

use std::sync::Arc;
use tabletalk_llm::claude::{self, ClaudeProvider};
use tabletalk_llm::ollama::{self, OllamaProvider};
use tabletalk_llm::{LlmConfig, LlmError, LlmProvider, ProviderKind};
use tracing::info;

use crate::config::LlmSection;

pub fn build_provider(
    kind: ProviderKind,
    section: &LlmSection,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let default_model = match kind {
        ProviderKind::Ollama => ollama::DEFAULT_MODEL,
        ProviderKind::Claude => claude::DEFAULT_MODEL,
    };
    let model = section.model.as_deref().unwrap_or(default_model);
    let config = LlmConfig::with_model(model)
        .max_tokens(section.max_tokens)
        .temperature(section.temperature)
        .request_timeout(section.timeout());

    let provider: Arc<dyn LlmProvider> = match kind {
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(section.base_url.clone(), config)?),
        ProviderKind::Claude => Arc::new(ClaudeProvider::from_env(config)?),
    };
    info!(provider = provider.name(), model = provider.model(), "Generation backend ready");
    Ok(provider)
}
