use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use crate::error_handling::types::TutorError;
use crate::storage::types::{Question, QuestionContent, Session};
use crate::storage::Storage;

/// The structure related to session management
///
/// Creates sessions and registers questions under them. Holds no state of its
/// own: everything lives in the injected `Storage`.
pub struct SessionManager {
    storage: Arc<dyn Storage>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Mints a new opaque session token and persists it.
    pub async fn start_session(&self) -> Result<Session, TutorError> {
        let token = Uuid::new_v4().simple().to_string();
        let session = self.storage.create_session(&token).await?;
        info!("[s:{}] session started", session.session_id);
        Ok(session)
    }

    /// Stores a question under `session_id` and returns its id.
    pub async fn submit_question(
        &self,
        session_id: &str,
        content: &QuestionContent,
    ) -> Result<i32, TutorError> {
        let serialized = content.to_json()?;
        let question_id = self.storage.add_question(session_id, &serialized).await?;
        info!("[s:{}] question {} submitted", session_id, question_id);
        Ok(question_id)
    }

    /// Earlier questions of the session that owns `question_id`.
    pub async fn history(&self, question_id: i32) -> Result<Vec<Question>, TutorError> {
        let question = self.storage.get_question(question_id).await?;
        let previous = self
            .storage
            .get_previous_questions(&question.session_id, question_id)
            .await?;
        debug!(
            "[q:{}] {} earlier questions in session {}",
            question_id,
            previous.len(),
            question.session_id
        );
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatabaseStorage;
    use tempfile::TempDir;

    async fn manager() -> SessionManager {
        SessionManager::new(storage().await)
    }

    async fn storage() -> Arc<DatabaseStorage> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.sqlite3");
        Box::leak(Box::new(dir));
        Arc::new(DatabaseStorage::open_file(path).await.unwrap())
    }

    #[tokio::test]
    async fn test_tokens_are_unique_hex() {
        let manager = manager().await;
        let a = manager.start_session().await.unwrap();
        let b = manager.start_session().await.unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.session_id.len(), 32);
        assert!(a.session_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_submitted_question_belongs_to_session() {
        let storage = storage().await;
        let manager = SessionManager::new(storage.clone());
        let session = manager.start_session().await.unwrap();
        let content = QuestionContent::new("今天天气怎么样", None);
        let id = manager
            .submit_question(&session.session_id, &content)
            .await
            .unwrap();

        let question = storage.get_question(id).await.unwrap();
        assert_eq!(question.session_id, session.session_id);
        assert_eq!(question.parsed_content().unwrap(), content);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let manager = manager().await;
        let err = manager
            .submit_question("nope", &QuestionContent::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_history_only_lists_earlier_questions() {
        let manager = manager().await;
        let session = manager.start_session().await.unwrap();
        let first = manager
            .submit_question(&session.session_id, &QuestionContent::new("一", None))
            .await
            .unwrap();
        let second = manager
            .submit_question(&session.session_id, &QuestionContent::new("二", None))
            .await
            .unwrap();

        assert!(manager.history(first).await.unwrap().is_empty());
        let history = manager.history(second).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, first);
    }
}
