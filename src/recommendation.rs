//! Follow-up question recommendations.
//!
//! Unlike retrieval, a model reply that is not a JSON array of strings is an
//! error for the caller; there is no sensible empty fallback.

use std::sync::Arc;

use log::{debug, info};

use crate::error_handling::types::TutorError;
use crate::storage::Storage;
use crate::upstream::{CompletionRequest, TextCompletion};

fn recommendation_prompt(count: usize) -> String {
    format!(
        "根据文本推荐{count}个与中学数学相关的问题，每个问题不超过15个字，只返回JSON数组。\
示例：[\"如何解一元二次方程？\",\"一元二次方程的判别式是什么？\",\"如何求二次函数的顶点？\"]"
    )
}

pub struct Recommender {
    storage: Arc<dyn Storage>,
    completion: Arc<dyn TextCompletion>,
    model: Option<String>,
    max_items: usize,
}

impl Recommender {
    pub fn new(
        storage: Arc<dyn Storage>,
        completion: Arc<dyn TextCompletion>,
        model: Option<String>,
        max_items: usize,
    ) -> Self {
        Self {
            storage,
            completion,
            model,
            max_items,
        }
    }

    /// Up to `max_items` follow-up questions derived from the stored answer.
    pub async fn recommend(&self, question_id: i32) -> Result<Vec<String>, TutorError> {
        let answer = self
            .storage
            .get_answer(question_id)
            .await?
            .ok_or_else(|| TutorError::NotFound("Answer not found".to_string()))?;

        let mut request =
            CompletionRequest::new(recommendation_prompt(self.max_items), format!("text: {answer}"));
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        let reply = self.completion.complete(&request).await?;
        debug!("[q:{}] recommendation reply: {:?}", question_id, reply);

        let mut items: Vec<String> = serde_json::from_str(reply.trim()).map_err(|e| {
            TutorError::ParseFailure(format!("recommendations are not a JSON string array: {e}"))
        })?;
        items.truncate(self.max_items);
        info!("[q:{}] {} recommendations", question_id, items.len());
        Ok(items)
    }
}
