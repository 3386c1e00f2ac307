//! Session management core module.
//!
//! This module provides the lifecycle of chat sessions and the questions asked
//! within them.

use serde::{Deserialize, Serialize};

use crate::storage::types::Question;

/// Submodule for session manager implementation.
pub mod session_manager;

/// Committed state of a single question.
///
/// Retrieval and streaming are request-scoped phases and leave no trace here;
/// only a stored answer moves a question on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionStatus {
    /// Stored, no answer yet
    Submitted,
    /// The answer has been persisted and can no longer change
    Completed,
}

impl QuestionStatus {
    pub fn of(question: &Question) -> Self {
        if question.answer.is_some() {
            QuestionStatus::Completed
        } else {
            QuestionStatus::Submitted
        }
    }

    /// Whether a streamed answer may still be written for the question.
    pub fn accepts_answer(self) -> bool {
        self == QuestionStatus::Submitted
    }
}
