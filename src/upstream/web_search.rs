//! Web search capability backed by the Zhipu `web-search-pro` tool.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error_handling::types::UpstreamError;

/// Where the search payload sits inside a `web-search-pro` response.
const SEARCH_RESULT_POINTER: &str = "/choices/0/message/tool_calls/1/search_result";

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Runs one search and returns the raw response payload.
    async fn search(&self, query: &str) -> Result<Value, UpstreamError>;
}

/// Pulls the search results out of a raw `web-search-pro` response.
///
/// The provider places the search payload in the second tool call. Any other
/// shape is reported as `UpstreamError::Parse`.
pub fn extract_search_result(payload: &Value) -> Result<Value, UpstreamError> {
    payload
        .pointer(SEARCH_RESULT_POINTER)
        .cloned()
        .ok_or_else(|| {
            UpstreamError::Parse("search response has no tool_calls[1].search_result".to_string())
        })
}

#[derive(Debug, Serialize)]
struct ToolRequest<'a> {
    request_id: String,
    tool: &'static str,
    stream: bool,
    messages: [ToolMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ToolMessage<'a> {
    role: &'static str,
    content: &'a str,
}

pub struct ZhipuWebSearch {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ZhipuWebSearch {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("HTTP client error: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl WebSearch for ZhipuWebSearch {
    async fn search(&self, query: &str) -> Result<Value, UpstreamError> {
        let request = ToolRequest {
            request_id: Uuid::new_v4().to_string(),
            tool: "web-search-pro",
            stream: false,
            messages: [ToolMessage {
                role: "user",
                content: query,
            }],
        };
        debug!("Web search {} for {:?}", request.request_id, query);

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("search request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(UpstreamError::Unavailable(format!(
                "search API error ({status}): {body}"
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Parse(format!("invalid search response: {e}")))
    }
}
