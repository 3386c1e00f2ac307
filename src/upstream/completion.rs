//! Text completion capability.
//!
//! One system prompt plus one user prompt in, one text out. The concrete
//! client speaks the OpenAI-compatible chat completions protocol, which the
//! Qwen endpoints expose.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error_handling::types::UpstreamError;

/// Completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Model override; the client default is used when `None`
    pub model: Option<String>,
    pub system: String,
    pub user: String,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: None,
            system: system.into(),
            user: user.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Returns the model's text for `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("HTTP client error: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: default_model.into(),
        })
    }

    fn to_chat_request(&self, request: &CompletionRequest) -> ChatRequest {
        ChatRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(request.system.clone()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(request.user.clone()),
                },
            ],
        }
    }
}

fn parse_chat_response(body: &str) -> Result<String, UpstreamError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Parse(format!("invalid completion response: {e}")))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| UpstreamError::Parse("completion response has no content".to_string()))
}

#[async_trait]
impl TextCompletion for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        let chat_request = self.to_chat_request(request);
        debug!("Completion request to model {}", chat_request.model);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("completion request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(UpstreamError::Unavailable(format!(
                "completion API error ({status}): {body}"
            )));
        }

        let content = parse_chat_response(&body)?;
        debug!("Completion result: {}", content.chars().take(80).collect::<String>());
        Ok(content)
    }
}
