//! LLM Client Layer - chat completion providers, usage types and reply parsing
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - Anthropic and OpenAI implementations, picked by model name
//! - Fenced code extraction from replies

pub mod anthropic;
pub mod client;
pub mod extract;
pub mod openai;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use anthropic::AnthropicClient;
pub use client::{LlmClient, LlmError, MockLlmClient};
pub use extract::{extract_code, extract_last_code};
pub use openai::OpenAiClient;
pub use types::{CompletionRequest, CompletionResponse, DEFAULT_SYSTEM_MESSAGE, Message, Role, StopReason, Usage};

/// Settings shared by every provider client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub temperature: Option<f32>,
    /// Overrides the provider's default key variable
    pub api_key_env: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
            timeout: Duration::from_secs(300),
            temperature: None,
            api_key_env: None,
        }
    }
}

impl ClientConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Build the provider client for `config.model`.
///
/// `claude*` models go to Anthropic, `gpt*` models to OpenAI.
pub fn connect(config: ClientConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    if config.model.starts_with("claude") {
        Ok(Arc::new(AnthropicClient::new(config)?))
    } else if config.model.starts_with("gpt") {
        Ok(Arc::new(OpenAiClient::new(config)?))
    } else {
        Err(LlmError::UnsupportedModel(config.model))
    }
}
