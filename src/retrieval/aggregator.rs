use std::sync::Arc;

use log::{info, warn};
use serde_json::Value;

use crate::error_handling::types::{TutorError, UpstreamError};
use crate::retrieval::classifier::Classifier;
use crate::retrieval::knowledge_catalog::{KnowledgeCatalog, KnowledgeItem};
use crate::storage::types::{Question, QuestionContent, RetrievalKind, RetrieveData};
use crate::storage::Storage;
use crate::upstream::{extract_search_result, WebSearch};

/// Reported when a question does not warrant an enrichment lookup.
pub const NO_NEED_TO_SEARCH: &str = "No need to search";

/// Fetches knowledge-base and web-search enrichment for a question and
/// persists one result row per kind.
pub struct RetrievalAggregator {
    storage: Arc<dyn Storage>,
    classifier: Arc<Classifier>,
    catalog: Arc<KnowledgeCatalog>,
    web_search: Arc<dyn WebSearch>,
}

impl RetrievalAggregator {
    pub fn new(
        storage: Arc<dyn Storage>,
        classifier: Arc<Classifier>,
        catalog: Arc<KnowledgeCatalog>,
        web_search: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            storage,
            classifier,
            catalog,
            web_search,
        }
    }

    async fn question_text(&self, question_id: i32) -> Result<String, TutorError> {
        let question: Question = self.storage.get_question(question_id).await?;
        let content: QuestionContent = question
            .parsed_content()
            .map_err(|e| TutorError::ParseFailure(format!("stored question content: {e}")))?;
        Ok(content.user_question)
    }

    /// Looks the question up in the knowledge catalog.
    ///
    /// Non-math questions and unmatched categories yield `NoMatch`.
    pub async fn knowledge_search(&self, question_id: i32) -> Result<Vec<KnowledgeItem>, TutorError> {
        let question = self.question_text(question_id).await?;

        if !self.classifier.classify_math_intent(&question).await {
            info!("[q:{}] not a math question, skipping knowledge search", question_id);
            return Err(TutorError::NoMatch(NO_NEED_TO_SEARCH.to_string()));
        }

        let category = self
            .classifier
            .classify_category(&question, &self.catalog.keywords())
            .await;
        let Some(entry) = category.as_deref().and_then(|id| self.catalog.find(id)) else {
            info!("[q:{}] no knowledge category matched", question_id);
            return Err(TutorError::NoMatch(
                "No matching knowledge category".to_string(),
            ));
        };

        let items = vec![KnowledgeItem::from(entry)];
        let blob = serde_json::to_string(&items)
            .map_err(|e| TutorError::StorageFailure(e.to_string()))?;
        self.storage
            .save_retrieval_result(RetrievalKind::Knowledge, question_id, &blob)
            .await?;
        info!("[q:{}] knowledge category {} stored", question_id, entry.id);
        Ok(items)
    }

    /// Searches the web with keywords extracted from the question.
    ///
    /// No keywords means `NoMatch` and nothing is written. A response without
    /// the expected search payload is also treated as `NoMatch`.
    pub async fn web_search(&self, question_id: i32) -> Result<Value, TutorError> {
        let question = self.question_text(question_id).await?;

        let keywords = self.classifier.extract_keywords(&question).await;
        if keywords.is_empty() {
            info!("[q:{}] no search keywords, skipping web search", question_id);
            return Err(TutorError::NoMatch(NO_NEED_TO_SEARCH.to_string()));
        }

        let query = keywords.join(" ");
        info!("[q:{}] web search for {:?}", question_id, query);
        let payload = self.web_search.search(&query).await?;
        let results = match extract_search_result(&payload) {
            Ok(results) => results,
            Err(UpstreamError::Parse(reason)) => {
                warn!("[q:{}] {}", question_id, reason);
                return Err(TutorError::NoMatch(NO_NEED_TO_SEARCH.to_string()));
            }
            Err(other) => return Err(other.into()),
        };

        self.storage
            .save_retrieval_result(RetrievalKind::WebSearch, question_id, &results.to_string())
            .await?;
        Ok(results)
    }

    /// Stores a RAG result produced elsewhere for the question.
    pub async fn add_rag_result(&self, question_id: i32, blob: &str) -> Result<i32, TutorError> {
        Ok(self
            .storage
            .save_retrieval_result(RetrievalKind::Rag, question_id, blob)
            .await?)
    }

    /// Merged retrieval record; never fails on missing kinds.
    pub async fn get_retrieve_data(&self, question_id: i32) -> Result<RetrieveData, TutorError> {
        Ok(self.storage.get_retrieve_data(question_id).await?)
    }
}
