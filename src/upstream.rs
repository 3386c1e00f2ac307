//! External AI and search capabilities.
//!
//! Each capability is a trait so the core only depends on the contract:
//! - `completion`: one-shot text completion
//! - `agent`: streamed, session-bound conversational agent
//! - `web_search`: keyword web search
//!
//! The HTTP clients are constructed once at start-up and injected.

pub mod agent;
pub mod completion;
pub mod web_search;

pub use agent::{AgentChunk, AgentStream, ConversationAgent, DashScopeAgent};
pub use completion::{CompletionRequest, OpenAiCompatClient, TextCompletion};
pub use web_search::{extract_search_result, WebSearch, ZhipuWebSearch};
