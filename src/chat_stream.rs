//! Streamed answers.
//!
//! The orchestrator forwards agent chunks as they arrive. When the agent is
//! done it hands the answer to a background commit, which moves an unanswered
//! question to `Completed`.

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{AnswerOrchestrator, ChatStream};
pub use prompt::AnswerPrompt;
