
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::LlmConfig;
use crate::http::{agent_with_timeout, request_with_retry};
use crate::llm::{ChatMessage, CompletionModel};

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct OpenAiClient {
    endpoint: Url,
    model: String,
    temperature: f32,
    api_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

// keep the key out of logs
impl std::fmt::Debug for OpenAiClient {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("retry_attempts", &self.retry_attempts)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    // null on refusals and tool calls
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Build a client, reading the API key from the configured environment variable
    #[inline]
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        Self::new(config, api_key)
    }

    #[inline]
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let endpoint = config
            .chat_completions_url()
            .context("Failed to build chat completions URL")?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            agent: agent_with_timeout(Duration::from_secs(config.timeout_secs)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `messages` and return the content of the first choice
    #[inline]
    pub fn complete_blocking(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;
        let authorization = format!("Bearer {}", self.api_key);

        debug!(
            "Requesting completion from {} with {} messages",
            self.model,
            messages.len()
        );

        let response_text = request_with_retry(self.endpoint.as_str(), self.retry_attempts, || {
            self.agent
                .post(self.endpoint.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", &authorization)
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Chat completion request failed")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Chat completion returned no choices"))?;
        let answer = choice.message.content.ok_or_else(|| {
            anyhow::anyhow!(
                "Chat completion returned no content (finish reason: {})",
                choice.finish_reason.as_deref().unwrap_or("unknown")
            )
        })?;

        debug!("Received completion of {} characters", answer.len());
        Ok(answer)
    }
}

#[async_trait]
impl CompletionModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let client = self.clone();
        let messages = messages.to_vec();
        tokio::task::spawn_blocking(move || client.complete_blocking(&messages))
            .await
            .context("Completion task panicked")?
    }
}
