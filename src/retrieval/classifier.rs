//! Keyword and intent classification over a text-completion capability.
//!
//! All three decisions fail closed: model errors and output outside the
//! expected format count as "no match" and are only logged.

use std::sync::Arc;

use log::{debug, warn};
use serde::Deserialize;

use crate::retrieval::knowledge_catalog::CategoryKeyword;
use crate::upstream::{CompletionRequest, TextCompletion};

const MATH_INTENT_PROMPT: &str =
    "你需要对用户的问题进行分类，判断是否属于数学相关的问题，若是，则返回1，否则返回0";

const KEYWORD_EXTRACTION_PROMPT: &str = "请判断用户问题与中学数学知识点是否相关。如果是，请提取与问题相关的联网搜索关键词。\
如果问题与数学无关，请返回空关键词列表。\
严格按照输出格式：{\"related\": true/false, \"keywords\": [\"关键词1\", \"关键词2\"]}。";

const CATEGORY_PROMPT: &str =
    "根据用户问题判断和下列哪种类别最相关，给出且仅给出一个类别id，例如：17。类别如下：";

#[derive(Debug, Deserialize)]
struct KeywordVerdict {
    related: bool,
    #[serde(default)]
    keywords: Vec<String>,
}

pub struct Classifier {
    completion: Arc<dyn TextCompletion>,
}

impl Classifier {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self { completion }
    }

    async fn ask(&self, system: String, user: String) -> Option<String> {
        match self
            .completion
            .complete(&CompletionRequest::new(system, user))
            .await
        {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!("Classification call failed, treating as no match: {}", e);
                None
            }
        }
    }

    /// Whether the question is a math question; only a literal `1` counts.
    pub async fn classify_math_intent(&self, question: &str) -> bool {
        let Some(reply) = self
            .ask(MATH_INTENT_PROMPT.to_string(), question.to_string())
            .await
        else {
            return false;
        };
        debug!("Math intent verdict: {:?}", reply);
        reply == "1"
    }

    /// Search keywords for the question, empty when unrelated or unparseable.
    pub async fn extract_keywords(&self, question: &str) -> Vec<String> {
        let prompt = format!("{KEYWORD_EXTRACTION_PROMPT}用户问题：{question}");
        let Some(reply) = self
            .ask("You are a helpful assistant.".to_string(), prompt)
            .await
        else {
            return Vec::new();
        };
        match serde_json::from_str::<KeywordVerdict>(reply.trim()) {
            Ok(verdict) if verdict.related => verdict
                .keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!("Keyword extraction output not parseable ({}): {:?}", e, reply);
                Vec::new()
            }
        }
    }

    /// Category id picked by the model, if it names one from `catalog`.
    pub async fn classify_category(
        &self,
        question: &str,
        catalog: &[CategoryKeyword],
    ) -> Option<String> {
        let listing = serde_json::to_string(catalog).unwrap_or_default();
        let reply = self
            .ask(format!("{CATEGORY_PROMPT}{listing}"), question.to_string())
            .await?;
        let id = reply.trim().trim_matches(|c| c == '"' || c == '\'');
        debug!("Category verdict: {:?}", id);
        catalog
            .iter()
            .any(|k| k.id == id)
            .then(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::UpstreamError;
    use crate::test_support::FakeCompletion;

    fn catalog() -> Vec<CategoryKeyword> {
        vec![
            CategoryKeyword {
                id: "17".into(),
                keyword: "函数的零点".into(),
            },
            CategoryKeyword {
                id: "18".into(),
                keyword: "二次函数".into(),
            },
        ]
    }

    #[tokio::test]
    async fn test_math_intent_requires_literal_one() {
        assert!(Classifier::new(FakeCompletion::replying("1"))
            .classify_math_intent("求零点")
            .await);
        assert!(!Classifier::new(FakeCompletion::replying(" 1\n"))
            .classify_math_intent("求零点")
            .await);
        assert!(!Classifier::new(FakeCompletion::replying("0"))
            .classify_math_intent("今天天气怎么样")
            .await);
        assert!(!Classifier::new(FakeCompletion::replying("是的，1"))
            .classify_math_intent("求零点")
            .await);
    }

    #[tokio::test]
    async fn test_math_intent_fails_closed_on_upstream_error() {
        let completion = FakeCompletion::new(|_| Err(UpstreamError::Unavailable("down".into())));
        assert!(!Classifier::new(completion).classify_math_intent("1+1").await);
    }

    #[tokio::test]
    async fn test_keywords_when_related() {
        let completion =
            FakeCompletion::replying(r#"{"related": true, "keywords": ["函数零点", " 二次函数 ", ""]}"#);
        let classifier = Classifier::new(completion.clone());
        let keywords = classifier.extract_keywords("f(x)=x^2-1 的零点").await;
        assert_eq!(keywords, vec!["函数零点", "二次函数"]);

        let sent = completion.requests.lock().unwrap()[0].clone();
        assert!(sent.user.ends_with("用户问题：f(x)=x^2-1 的零点"));
    }

    #[tokio::test]
    async fn test_keywords_fail_closed() {
        let unrelated = FakeCompletion::replying(r#"{"related": false, "keywords": ["天气"]}"#);
        assert!(Classifier::new(unrelated).extract_keywords("天气").await.is_empty());

        let garbage = FakeCompletion::replying("```json\n{\"related\": true}\n```");
        assert!(Classifier::new(garbage).extract_keywords("x").await.is_empty());
    }

    #[tokio::test]
    async fn test_category_must_exist_in_catalog() {
        let hit = Classifier::new(FakeCompletion::replying("17"));
        assert_eq!(
            hit.classify_category("零点", &catalog()).await.as_deref(),
            Some("17")
        );

        let miss = Classifier::new(FakeCompletion::replying("99"));
        assert_eq!(miss.classify_category("零点", &catalog()).await, None);
    }

    #[tokio::test]
    async fn test_category_prompt_lists_catalog() {
        let completion = FakeCompletion::replying("18");
        Classifier::new(completion.clone())
            .classify_category("抛物线", &catalog())
            .await;
        let sent = completion.requests.lock().unwrap()[0].clone();
        assert!(sent.system.contains("\"keyword\":\"二次函数\""));
        assert_eq!(sent.user, "抛物线");
    }
}
