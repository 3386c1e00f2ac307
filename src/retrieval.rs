//! Retrieval enrichment for questions.
//!
//! - `knowledge_catalog`: static catalog loaded at start-up
//! - `classifier`: LLM-backed intent, keyword and category decisions
//! - `aggregator`: runs the lookups and persists one result per kind

pub mod aggregator;
pub mod classifier;
pub mod knowledge_catalog;

pub use aggregator::{RetrievalAggregator, NO_NEED_TO_SEARCH};
pub use classifier::Classifier;
pub use knowledge_catalog::{KnowledgeCatalog, KnowledgeItem};
