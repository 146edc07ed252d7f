//! Mock LLM Provider for deterministic testing
//!
//! Provides canned responses without network calls. Responses are consumed in
//! order and every prompt is recorded so tests can assert which pipeline
//! stages asked the model for something.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{LlmError, LlmProvider};

/// Configuration for a single canned response
#[derive(Debug, Clone)]
pub struct CannedResponse {
    /// Text content to return, or the failure to report
    pub outcome: Result<String, String>,
    /// Optional delay before answering (simulates thinking time)
    pub delay_ms: u64,
}

impl CannedResponse {
    /// Create a simple text response
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            outcome: Ok(content.into()),
            delay_ms: 0,
        }
    }

    /// Create a response with simulated delay
    pub fn with_delay(content: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            outcome: Ok(content.into()),
            delay_ms,
        }
    }

    /// Create a backend failure (surfaces as `LlmError::Provider`)
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            delay_ms: 0,
        }
    }
}

/// Mock LLM provider with deterministic responses
///
/// If no responses are queued, `generate` returns an error (to catch test
/// configuration issues). Clones share the queue and the prompt log.
#[derive(Clone, Default)]
pub struct MockProvider {
    /// Queue of responses to return
    responses: Arc<Mutex<VecDeque<CannedResponse>>>,
    /// Record of prompts received (for assertions)
    received_prompts: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with responses already queued
    pub fn with_responses(responses: Vec<CannedResponse>) -> Self {
        let provider = Self::new();
        provider.queue_responses(responses);
        provider
    }

    /// Queue a response for the next generate call
    pub fn queue_response(&self, response: CannedResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    /// Queue multiple responses
    pub fn queue_responses(&self, responses: Vec<CannedResponse>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.extend(responses);
        }
    }

    /// Get all prompts received by this provider
    pub fn received_prompts(&self) -> Vec<String> {
        self.received_prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Number of generate calls made so far
    pub fn call_count(&self) -> usize {
        self.received_prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Check how many responses are still queued
    pub fn responses_remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    fn model(&self) -> &str {
        "mock-test-model"
    }

    fn is_ready(&self) -> bool {
        true // Always ready for testing
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.received_prompts
            .lock()
            .map_err(|_| LlmError::Internal("MockProvider prompt log poisoned".to_string()))?
            .push(prompt.to_string());

        let response = self
            .responses
            .lock()
            .map_err(|_| LlmError::Internal("MockProvider queue poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| {
                LlmError::Internal(
                    "MockProvider: No responses queued! Queue responses before calling generate"
                        .to_string(),
                )
            })?;

        if response.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(response.delay_ms)).await;
        }

        response.outcome.map_err(|message| LlmError::Provider {
            provider: "Mock".to_string(),
            message,
        })
    }
}
