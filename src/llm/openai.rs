//! OpenAI chat completions client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::ClientConfig;
use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{CompletionRequest, CompletionResponse, Role, StopReason, Usage};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI API client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    config: ClientConfig,
}

impl OpenAiClient {
    pub fn new(config: ClientConfig) -> Result<Self, LlmError> {
        let env_var = config.api_key_env.clone().unwrap_or_else(|| OPENAI_KEY_ENV.to_string());
        let api_key = std::env::var(&env_var).map_err(|_| LlmError::MissingApiKey { env_var })?;
        Self::with_api_key(api_key, config)
    }

    pub fn with_api_key(api_key: String, config: ClientConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_ref().unwrap_or(&self.config.model).clone();

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.messages.iter().any(|m| m.role == Role::System) {
            messages.push(json!({"role": "system", "content": request.system_or_default()}));
        }
        messages.extend(
            request
                .messages
                .iter()
                .map(|m| json!({"role": m.role.as_str(), "content": m.content})),
        );

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
        });
        if let Some(temperature) = request.temperature.or(self.config.temperature) {
            body["temperature"] = json!(temperature);
        }
        body
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let choice = body["choices"]
            .get(0)
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let content = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("choice has no message content".to_string()))?
            .to_string();

        let stop_reason = match choice["finish_reason"].as_str() {
            Some("length") => StopReason::MaxTokens,
            Some("stop") | None => StopReason::EndTurn,
            Some(_) => StopReason::StopSequence,
        };

        let usage = Usage::new(
            body["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            body["usage"]["completion_tokens"].as_u64().unwrap_or(0),
        );

        Ok(CompletionResponse {
            content,
            stop_reason,
            usage,
            model: body["model"].as_str().unwrap_or(&self.config.model).to_string(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        self.parse_response(response.json().await?)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
