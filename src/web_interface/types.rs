use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::retrieval::KnowledgeItem;
use crate::storage::types::{Question, QuestionContent};

pub const SUCCESS_CODE: u16 = 200;
pub const ERROR_CODE: u16 = 500;

/// Uniform JSON response body: `{code, msg, res_data?}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: u16,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res_data: Option<T>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: "success".to_string(),
            res_data: Some(data),
        }
    }
}

impl ApiEnvelope<()> {
    pub fn error(msg: impl Into<String>) -> Self {
        Self::error_with_code(ERROR_CODE, msg)
    }

    pub fn error_with_code(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            res_data: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewQuestionRequest {
    pub user_question: String,
    #[serde(default)]
    pub ocr_msg: Option<String>,
}

/// Body of every per-question endpoint.
#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question_id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewChatResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewQuestionResponse {
    pub question_id: i32,
}

#[derive(Debug, Serialize)]
pub struct KnowledgeSearchResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub knowledge_items: Vec<KnowledgeItem>,
}

impl KnowledgeSearchResponse {
    pub fn new(knowledge_items: Vec<KnowledgeItem>) -> Self {
        Self {
            kind: "knowledge_search_result",
            knowledge_items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebSearchResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub web_search_items: Value,
}

impl WebSearchResponse {
    pub fn new(web_search_items: Value) -> Self {
        Self {
            kind: "web_search_result",
            web_search_items,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub recommend_items: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub question_id: i32,
    pub content: QuestionContent,
    pub summary: Option<String>,
    pub created_at: String, // RFC3339
}

impl From<&Question> for HistoryEntry {
    fn from(question: &Question) -> Self {
        Self {
            question_id: question.id,
            content: question.parsed_content().unwrap_or_default(),
            summary: question.summary.clone(),
            created_at: question.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub questions: Vec<HistoryEntry>,
}
