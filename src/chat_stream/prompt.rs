use serde_json::json;

use crate::storage::types::{QuestionContent, RetrieveData};

const ANSWER_SYSTEM_PROMPT: &str = "你是一个智能助手，你需要参考引用内容首先进行引用内容的思考（需要给出参考的具体引用），然后对用户的问题进行回答。";

/// Two-turn prompt for the answer agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerPrompt {
    pub system: String,
    pub user: String,
}

impl AnswerPrompt {
    /// Builds the prompt from the question and whatever retrieval data exists.
    /// Missing retrieval kinds show up as empty strings.
    pub fn compose(content: &QuestionContent, retrieve: &RetrieveData) -> Self {
        let citations = json!({
            "web_search_result": retrieve.web_search_result,
            "rag_result": retrieve.rag_result,
            "knowledge_search_result": retrieve.knowledge_search_result,
        });
        let user = format!(
            "引用内容：{}\n1. 问题：{}\n2. 图片ocr 识别结果：{}",
            citations,
            content.user_question,
            content.ocr_msg.as_deref().unwrap_or_default()
        );
        Self {
            system: ANSWER_SYSTEM_PROMPT.to_string(),
            user,
        }
    }

    /// Single-string form sent to the agent, which takes one prompt per turn.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}
