//! Streaming conversational agent capability.
//!
//! The agent keeps its own multi-turn memory keyed by an external session id.
//! A call either starts a new external session or continues an existing one,
//! and yields incremental text chunks, each tagged with a status and the
//! external session id the agent reports.
//!
//! The concrete client targets a DashScope application endpoint in SSE mode.
//! Frames look like
//!
//! ```text
//! id:1
//! event:result
//! :HTTP_STATUS/200
//! data:{"output":{"session_id":"…","text":"…"},"request_id":"…"}
//! ```

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error_handling::types::UpstreamError;

const STATUS_OK: u16 = 200;

/// One incremental piece of an agent answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentChunk {
    pub status: u16,
    pub text: String,
    pub session_id: Option<String>,
}

impl AgentChunk {
    pub fn is_healthy(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Lazy, finite, non-restartable sequence of agent chunks.
pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentChunk, UpstreamError>> + Send>>;

#[async_trait]
pub trait ConversationAgent: Send + Sync {
    /// Opens a streamed agent call, continuing `session_id` when given.
    ///
    /// Fails with `UpstreamError::Unavailable` when the call cannot be
    /// established at all; no partial stream is produced in that case.
    async fn start_or_continue(
        &self,
        session_id: Option<&str>,
        prompt: &str,
    ) -> Result<AgentStream, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct AppCompletionRequest<'a> {
    input: AppInput<'a>,
    parameters: AppParameters,
}

#[derive(Debug, Serialize)]
struct AppInput<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct AppParameters {
    incremental_output: bool,
}

#[derive(Debug, Deserialize)]
struct AppFrame {
    #[serde(default)]
    output: Option<AppOutput>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppOutput {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

/// A decoded server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub name: Option<String>,
    pub http_status: Option<u16>,
    pub data: String,
}

/// Incremental SSE decoder; bytes may split lines and UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    current: SseEvent,
    has_data: bool,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.feed_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing event not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.feed_line(rest.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.take_event()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.take_event();
        }
        if let Some(status) = line.strip_prefix(":HTTP_STATUS/") {
            self.current.http_status = status.trim().parse().ok();
        } else if line.starts_with(':') {
            // comment
        } else if let Some(name) = line.strip_prefix("event:") {
            self.current.name = Some(name.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            if self.has_data {
                self.current.data.push('\n');
            }
            self.current.data.push_str(data);
            self.has_data = true;
        }
        None
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        let event = std::mem::take(&mut self.current);
        let had_data = std::mem::replace(&mut self.has_data, false);
        had_data.then_some(event)
    }
}

/// Turns one SSE event into an [`AgentChunk`].
pub(crate) fn chunk_from_event(event: &SseEvent) -> Result<AgentChunk, UpstreamError> {
    let frame: AppFrame = serde_json::from_str(&event.data)
        .map_err(|e| UpstreamError::Parse(format!("invalid agent frame: {e}")))?;
    let is_error = event.name.as_deref() == Some("error") || frame.code.is_some();
    let status = match (event.http_status, is_error) {
        (Some(status), _) => status,
        (None, true) => 500,
        (None, false) => STATUS_OK,
    };
    if status != STATUS_OK {
        debug!(
            "Agent frame status {}: {} {}",
            status,
            frame.code.as_deref().unwrap_or_default(),
            frame.message.as_deref().unwrap_or_default()
        );
    }
    let output = frame.output.unwrap_or(AppOutput {
        text: None,
        session_id: None,
    });
    Ok(AgentChunk {
        status,
        text: output.text.unwrap_or_default(),
        session_id: output.session_id,
    })
}

/// DashScope application client in incremental SSE mode.
pub struct DashScopeAgent {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    app_id: String,
}

impl DashScopeAgent {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        app_id: impl Into<String>,
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
            app_id: app_id.into(),
        })
    }

    fn completion_url(&self) -> String {
        format!("{}/apps/{}/completion", self.base_url, self.app_id)
    }
}

#[async_trait]
impl ConversationAgent for DashScopeAgent {
    async fn start_or_continue(
        &self,
        session_id: Option<&str>,
        prompt: &str,
    ) -> Result<AgentStream, UpstreamError> {
        match session_id {
            Some(id) => debug!("POST {} (session {})", self.completion_url(), id),
            None => debug!("POST {} (new session)", self.completion_url()),
        }
        let request = AppCompletionRequest {
            input: AppInput { prompt, session_id },
            parameters: AppParameters {
                incremental_output: true,
            },
        };

        let response = self
            .http
            .post(self.completion_url())
            .bearer_auth(&self.api_key)
            .header("X-DashScope-SSE", "enable")
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("agent request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UpstreamError::Unavailable(format!(
                "agent API error ({status}): {body}"
            )));
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::default();
            while let Some(next) = bytes.next().await {
                match next {
                    Ok(buf) => {
                        for event in decoder.push(&buf) {
                            yield chunk_from_event(&event);
                        }
                    }
                    Err(e) => {
                        yield Err(UpstreamError::Unavailable(format!("agent stream interrupted: {e}")));
                        break;
                    }
                }
            }
            if let Some(event) = decoder.finish() {
                yield chunk_from_event(&event);
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_handles_split_frames() {
        let mut decoder = SseDecoder::default();
        let first = decoder.push(b"id:1\nevent:result\n:HTTP_STATUS/200\ndata:{\"output\":{\"te");
        assert!(first.is_empty());
        let events = decoder.push(b"xt\":\"\xe9\x9b\xb6\",\"session_id\":\"abc\"}}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].http_status, Some(200));

        let chunk = chunk_from_event(&events[0]).unwrap();
        assert!(chunk.is_healthy());
        assert_eq!(chunk.text, "零");
        assert_eq!(chunk.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_decoder_splits_utf8_across_pushes() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data:{\"output\":{\"text\":\"\xe9").is_empty());
        let events = decoder.push(b"\x9b\xb6\"}}\r\n\r\n");
        assert_eq!(chunk_from_event(&events[0]).unwrap().text, "零");
    }

    #[test]
    fn test_error_event_is_unhealthy() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(
            b"event:error\n:HTTP_STATUS/400\ndata:{\"code\":\"InvalidParameter\",\"message\":\"bad\"}\n\n",
        );
        let chunk = chunk_from_event(&events[0]).unwrap();
        assert_eq!(chunk.status, 400);
        assert!(!chunk.is_healthy());
        assert!(chunk.text.is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data:{\"output\":{\"text\":\"end\"}}").is_empty());
        let event = decoder.finish().unwrap();
        assert_eq!(chunk_from_event(&event).unwrap().text, "end");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_events_without_data_are_skipped() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b":keep-alive\n\n").is_empty());
    }

    #[test]
    fn test_garbled_frame_is_a_parse_error() {
        let event = SseEvent {
            data: "not json".into(),
            ..Default::default()
        };
        assert!(matches!(chunk_from_event(&event), Err(UpstreamError::Parse(_))));
    }

    #[test]
    fn test_session_id_is_sent_only_when_continuing() {
        let fresh = AppCompletionRequest {
            input: AppInput {
                prompt: "hi",
                session_id: None,
            },
            parameters: AppParameters {
                incremental_output: true,
            },
        };
        let json = serde_json::to_value(&fresh).unwrap();
        assert!(json["input"].get("session_id").is_none());
        assert_eq!(json["parameters"]["incremental_output"], true);

        let agent =
            DashScopeAgent::new("https://h/api/v1/", "k", "app", Duration::from_secs(1)).unwrap();
        assert_eq!(agent.completion_url(), "https://h/api/v1/apps/app/completion");
    }
}
