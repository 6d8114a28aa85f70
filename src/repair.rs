//! Repair requests: ask the model for a fixed version of an artifact.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, TbloopError};
use crate::llm::{CompletionRequest, LlmClient, Message, Usage, extract_last_code};
use crate::usage::UsageScope;

/// One repair round trip
#[derive(Debug, Clone)]
pub struct RepairRequest {
    pub prompt: String,
    /// Fenced code language tag the repaired code is expected in
    pub language: String,
}

/// Repaired code plus what it cost
#[derive(Debug, Clone)]
pub struct RepairReply {
    /// Last fenced block of the reply, still carrying any line marks
    pub code: String,
    pub usage: Usage,
    pub transcript: Vec<Message>,
}

/// Produces exactly one best-effort repaired version of an artifact
#[async_trait]
pub trait RepairRequester: Send + Sync {
    async fn repair(&self, request: RepairRequest) -> Result<RepairReply>;
}

/// RepairRequester backed by an LLM client
pub struct LlmRepairer {
    client: Arc<dyn LlmClient>,
    usage: Arc<UsageScope>,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl LlmRepairer {
    pub fn new(client: Arc<dyn LlmClient>, usage: Arc<UsageScope>) -> Self {
        Self {
            client,
            usage,
            max_tokens: 8192,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl RepairRequester for LlmRepairer {
    async fn repair(&self, request: RepairRequest) -> Result<RepairReply> {
        let completion = CompletionRequest::default()
            .with_user_message(&request.prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let response = self.client.complete(completion.clone()).await?;
        self.usage.record(&response.model, &response.usage)?;

        let code = extract_last_code(&response.content, &request.language);
        if code.trim().is_empty() {
            return Err(TbloopError::Repair(format!(
                "{} reply contained no {} code",
                self.client.model(),
                request.language
            )));
        }

        log::debug!(
            "Repair reply from {}: {} prompt / {} completion tokens",
            response.model,
            response.usage.input_tokens,
            response.usage.output_tokens
        );

        Ok(RepairReply {
            code,
            usage: response.usage,
            transcript: response.transcript(&completion),
        })
    }
}
