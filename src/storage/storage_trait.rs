//! Storage Trait
//!
//! This module defines the `Storage` trait, the interface of the persistence layer.
//!
//! Implementors of this trait are responsible for:
//! - Creating sessions and the questions asked within them
//! - Recording the streamed answer and its background summary, each exactly once
//! - Persisting one retrieval result blob per question and kind
//! - Binding local sessions to external conversational-agent sessions
//!
//! Every write is committed before the call returns. Referencing an absent
//! session or question yields `StorageError::NotFound`.

use async_trait::async_trait;

use crate::error_handling::types::StorageError;
use crate::storage::types::{Question, RetrievalKind, RetrieveData, Session};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Creates a session row for a freshly minted token.
    async fn create_session(&self, session_id: &str) -> Result<Session, StorageError>;

    /// Adds a question under an existing session and returns its id.
    async fn add_question(&self, session_id: &str, content: &str) -> Result<i32, StorageError>;

    async fn get_question(&self, question_id: i32) -> Result<Question, StorageError>;

    /// Returns the answer of a question, `None` while it is still unanswered.
    async fn get_answer(&self, question_id: i32) -> Result<Option<String>, StorageError>;

    /// Up to five questions of the same session asked before `question_id`, newest first.
    async fn get_previous_questions(
        &self,
        session_id: &str,
        question_id: i32,
    ) -> Result<Vec<Question>, StorageError>;

    /// Records the full answer. Write-once.
    async fn set_answer(&self, question_id: i32, answer: &str) -> Result<(), StorageError>;

    /// Records the summary. Write-once, and only once an answer exists.
    async fn set_summary(&self, question_id: i32, summary: &str) -> Result<(), StorageError>;

    /// Persists a retrieval blob and returns its row id.
    ///
    /// The first write per kind and question wins; later writes return the
    /// existing row id without touching it.
    async fn save_retrieval_result(
        &self,
        kind: RetrievalKind,
        question_id: i32,
        content: &str,
    ) -> Result<i32, StorageError>;

    /// Reads all retrieval kinds for a question. Absent kinds are empty strings.
    async fn get_retrieve_data(&self, question_id: i32) -> Result<RetrieveData, StorageError>;

    async fn get_api_session(&self, session_id: &str) -> Result<Option<String>, StorageError>;

    /// Binds `session_id` to an external agent session unless a binding already
    /// exists; returns the binding in effect afterwards.
    async fn create_api_session(
        &self,
        session_id: &str,
        api_session_id: &str,
    ) -> Result<String, StorageError>;
}
