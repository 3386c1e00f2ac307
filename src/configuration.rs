//! Runtime configuration.
//!
//! `config` holds the top-level [`Config`] and its loading rules, `types` the
//! per-concern settings tables.

pub mod config;
pub mod types;

pub use config::Config;
pub use types::{
    AgentSettings, CompletionSettings, KnowledgeSettings, RecommendationSettings,
    ServerSettings, StorageSettings, SummarizerSettings, WebSearchSettings,
};
