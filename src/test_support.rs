//! In-crate fakes for the upstream capabilities, shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use crate::error_handling::types::UpstreamError;
use crate::storage::DatabaseStorage;
use crate::upstream::{AgentChunk, AgentStream, CompletionRequest, ConversationAgent, TextCompletion, WebSearch};

pub async fn temp_storage() -> Arc<DatabaseStorage> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sqlite3");
    // Keep TempDir alive by leaking it for the test duration
    Box::leak(Box::new(dir));
    Arc::new(DatabaseStorage::open_file(path).await.unwrap())
}

type Responder = dyn Fn(&CompletionRequest) -> Result<String, UpstreamError> + Send + Sync;

/// Completion fake answering through a closure and recording every request.
pub struct FakeCompletion {
    responder: Box<Responder>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletion {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&CompletionRequest) -> Result<String, UpstreamError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TextCompletion for FakeCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

/// Agent fake replaying scripted chunk sequences, one per call.
pub struct FakeAgent {
    scripts: Mutex<VecDeque<Result<Vec<Result<AgentChunk, UpstreamError>>, UpstreamError>>>,
    /// `(session id passed in, prompt)` per call
    pub calls: Mutex<Vec<(Option<String>, String)>>,
}

impl FakeAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, chunks: Vec<Result<AgentChunk, UpstreamError>>) {
        self.scripts.lock().unwrap().push_back(Ok(chunks));
    }

    pub fn fail_next(&self, err: UpstreamError) {
        self.scripts.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<(Option<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn ok_chunk(text: &str, session: &str) -> Result<AgentChunk, UpstreamError> {
    Ok(AgentChunk {
        status: 200,
        text: text.to_string(),
        session_id: Some(session.to_string()),
    })
}

#[async_trait]
impl ConversationAgent for FakeAgent {
    async fn start_or_continue(
        &self,
        session_id: Option<&str>,
        prompt: &str,
    ) -> Result<AgentStream, UpstreamError> {
        self.calls
            .lock()
            .unwrap()
            .push((session_id.map(str::to_owned), prompt.to_string()));
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))?;
        Ok(Box::pin(futures::stream::iter(script)))
    }
}

/// Web search fake returning a fixed payload.
pub struct FakeWebSearch {
    payload: Result<Value, String>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeWebSearch {
    pub fn returning(payload: Value) -> Arc<Self> {
        Arc::new(Self {
            payload: Ok(payload),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            payload: Err(reason.to_string()),
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl WebSearch for FakeWebSearch {
    async fn search(&self, query: &str) -> Result<Value, UpstreamError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.payload
            .clone()
            .map_err(UpstreamError::Unavailable)
    }
}
