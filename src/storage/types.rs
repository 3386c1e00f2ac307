use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error_handling::types::StorageError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i32,
    pub session_id: String,
    /// JSON-serialized [`QuestionContent`], kept verbatim as submitted.
    pub content: String,
    pub answer: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn parsed_content(&self) -> Result<QuestionContent, serde_json::Error> {
        serde_json::from_str(&self.content)
    }
}

/// What the user submitted: the question text plus optional OCR output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionContent {
    #[serde(default)]
    pub user_question: String,
    #[serde(default)]
    pub ocr_msg: Option<String>,
}

impl QuestionContent {
    pub fn new(user_question: impl Into<String>, ocr_msg: Option<String>) -> Self {
        Self {
            user_question: user_question.into(),
            ocr_msg,
        }
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|e| StorageError::WriteFailed(e.to_string()))
    }
}

/// The three retrieval result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalKind {
    WebSearch,
    Rag,
    Knowledge,
}

impl RetrievalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalKind::WebSearch => "web_search",
            RetrievalKind::Rag => "rag",
            RetrievalKind::Knowledge => "knowledge_search",
        }
    }
}

/// Merged retrieval payload for one question.
///
/// Every field is the committed blob of its kind, or an empty string when that
/// kind has not been written yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveData {
    pub web_search_result: String,
    pub rag_result: String,
    pub knowledge_search_result: String,
}

impl RetrieveData {
    pub fn is_empty(&self) -> bool {
        self.web_search_result.is_empty()
            && self.rag_result.is_empty()
            && self.knowledge_search_result.is_empty()
    }
}
