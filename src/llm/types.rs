//! LLM types for chat completion requests and responses
//!
//! This module defines the provider-neutral message types used by every client.

use serde::{Deserialize, Serialize};

/// System message used when a request does not carry its own.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are an expert in Verilog and Python hardware verification. \
Answer precisely and do not drop information to save words.";

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Request to the LLM for completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new completion request with a system prompt
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            ..Default::default()
        }
    }

    /// Add a message to the request
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Add a user message
    pub fn with_user_message(self, content: impl Into<String>) -> Self {
        self.with_message(Message::user(content))
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set sampling temperature
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// The system prompt, falling back to the default one
    pub fn system_or_default(&self) -> &str {
        if self.system.is_empty() {
            DEFAULT_SYSTEM_MESSAGE
        } else {
            &self.system
        }
    }
}

/// Response from the LLM
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
    pub model: String,
}

impl CompletionResponse {
    /// Conversation transcript for this exchange: request messages plus the reply
    pub fn transcript(&self, request: &CompletionRequest) -> Vec<Message> {
        let mut messages = Vec::with_capacity(request.messages.len() + 2);
        messages.push(Message::system(request.system_or_default()));
        messages.extend(request.messages.iter().cloned());
        messages.push(Message::assistant(&self.content));
        messages
    }
}

/// Reason why the LLM stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndTurn,
    MaxTokens,
    StopSequence,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    /// Create new usage stats
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Calculate total tokens
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate usage from another instance
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// Calculate cost in USD based on model
    pub fn cost_usd(&self, model: &str) -> f64 {
        let (input_rate, output_rate) = price_per_1k(model);
        (self.input_tokens as f64 / 1000.0 * input_rate) + (self.output_tokens as f64 / 1000.0 * output_rate)
    }
}

/// (prompt, completion) USD price per 1000 tokens
fn price_per_1k(model: &str) -> (f64, f64) {
    match model {
        m if m.contains("opus") => (0.015, 0.075),
        m if m.contains("sonnet") => (0.003, 0.015),
        m if m.contains("haiku") => (0.00025, 0.00125),
        m if m.starts_with("gpt-4o-mini") => (0.00015, 0.0006),
        m if m.starts_with("gpt-4o") => (0.0025, 0.01),
        m if m.starts_with("gpt-4-turbo") || m.contains("preview") => (0.01, 0.03),
        m if m.starts_with("gpt-4") => (0.03, 0.06),
        m if m.starts_with("gpt-3.5") => (0.0005, 0.0015),
        _ => (0.003, 0.015),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("Hello").role, Role::User);
        assert_eq!(Message::assistant("Hi").role, Role::Assistant);
        assert_eq!(Message::system("Be brief").content, "Be brief");
    }

    #[test]
    fn test_completion_request_builder() {
        let req = CompletionRequest::new("You are a helpful assistant")
            .with_user_message("Hello")
            .with_max_tokens(1000)
            .with_temperature(Some(0.2));

        assert_eq!(req.system, "You are a helpful assistant");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].content, "Hello");
        assert_eq!(req.max_tokens, Some(1000));
        assert_eq!(req.temperature, Some(0.2));
    }

    #[test]
    fn test_system_or_default() {
        assert_eq!(CompletionRequest::default().system_or_default(), DEFAULT_SYSTEM_MESSAGE);
        assert_eq!(CompletionRequest::new("custom").system_or_default(), "custom");
    }

    #[test]
    fn test_transcript_contains_reply() {
        let req = CompletionRequest::default().with_user_message("fix this");
        let resp = CompletionResponse {
            content: "fixed".to_string(),
            ..Default::default()
        };
        let transcript = resp.transcript(&req);
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[0].role, Role::System);
        assert_eq!(transcript[1].content, "fix this");
        assert_eq!(transcript[2], Message::assistant("fixed"));
    }

    #[test]
    fn test_usage_add_and_total() {
        let mut usage = Usage::new(100, 50);
        usage.add(&Usage::new(200, 100));
        assert_eq!(usage.input_tokens, 300);
        assert_eq!(usage.output_tokens, 150);
        assert_eq!(usage.total(), 450);
    }

    #[test]
    fn test_usage_cost_sonnet() {
        let usage = Usage::new(1000, 1000);
        let cost = usage.cost_usd("claude-sonnet-4-20250514");
        assert!((cost - 0.018).abs() < 0.0001);
    }

    #[test]
    fn test_usage_cost_gpt4o_mini() {
        let usage = Usage::new(1000, 1000);
        let cost = usage.cost_usd("gpt-4o-mini-2024-07-18");
        assert!((cost - 0.00075).abs() < 0.00001);
    }
}
