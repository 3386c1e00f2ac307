use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, Database,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Schema,
};

use crate::error_handling::types::StorageError;
use crate::storage::db_entities::{
    self as sessions, api_sessions, knowledge_search_results, questions, rag_results,
    web_search_results,
};
use crate::storage::storage_trait::Storage;
use crate::storage::types::{Question, RetrievalKind, RetrieveData, Session};

/// Number of earlier questions returned by `get_previous_questions`.
const PREVIOUS_QUESTIONS_LIMIT: u64 = 5;

fn read_err(e: DbErr) -> StorageError {
    StorageError::ReadFailed(e.to_string())
}

fn write_err(e: DbErr) -> StorageError {
    StorageError::WriteFailed(e.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::ReadFailed(format!("bad timestamp {raw:?}: {e}")))
}

fn into_question(row: questions::Model) -> Result<Question, StorageError> {
    Ok(Question {
        id: row.id,
        created_at: parse_timestamp(&row.created_at)?,
        session_id: row.session_id,
        content: row.content,
        answer: row.answer,
        summary: row.summary,
    })
}

/// Returns the row id of an existing result for the question, or inserts one.
macro_rules! save_once {
    ($table:ident, $db:expr, $question_id:expr, $content:expr) => {{
        let existing = $table::Entity::find()
            .filter($table::Column::QuestionId.eq($question_id))
            .one($db)
            .await
            .map_err(read_err)?;
        match existing {
            Some(row) => {
                debug!(
                    "[q:{}] {} already stored, keeping row {}",
                    $question_id,
                    stringify!($table),
                    row.id
                );
                row.id
            }
            None => {
                $table::ActiveModel {
                    question_id: Set($question_id),
                    content: Set($content.to_owned()),
                    ..Default::default()
                }
                .insert($db)
                .await
                .map_err(write_err)?
                .id
            }
        }
    }};
}

/// Loads the content of a result table for a question, or an empty string.
macro_rules! content_or_empty {
    ($table:ident, $db:expr, $question_id:expr) => {
        $table::Entity::find()
            .filter($table::Column::QuestionId.eq($question_id))
            .one($db)
            .await
            .map_err(read_err)?
            .map(|row| row.content)
            .unwrap_or_default()
    };
}

/// SQLite-backed [`Storage`] built on SeaORM.
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    /// Default database filename used in the application's working directory
    pub const DEFAULT_DB_FILE: &'static str = "tutorstream.sqlite3";

    /// Connects to `url` (e.g. `sqlite://tutorstream.sqlite3?mode=rwc`) and
    /// creates any missing tables.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let db = Database::connect(url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        let storage = Self { db };
        storage.create_schema().await?;
        info!("Database ready at {}", url);
        Ok(storage)
    }

    /// Opens (creating if missing) a database file at `path`.
    pub async fn open_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        }
        Self::connect(&format!("sqlite://{}?mode=rwc", path.display())).await
    }

    async fn create_schema(&self) -> Result<(), StorageError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let mut statements = vec![
            schema.create_table_from_entity(sessions::Entity),
            schema.create_table_from_entity(questions::Entity),
            schema.create_table_from_entity(web_search_results::Entity),
            schema.create_table_from_entity(rag_results::Entity),
            schema.create_table_from_entity(knowledge_search_results::Entity),
            schema.create_table_from_entity(api_sessions::Entity),
        ];
        for statement in statements.iter_mut() {
            statement.if_not_exists();
            self.db
                .execute(backend.build(&*statement))
                .await
                .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<sessions::Model>, StorageError> {
        sessions::Entity::find()
            .filter(sessions::Column::SessionId.eq(session_id))
            .one(&self.db)
            .await
            .map_err(read_err)
    }

    async fn find_question(&self, question_id: i32) -> Result<questions::Model, StorageError> {
        questions::Entity::find_by_id(question_id)
            .one(&self.db)
            .await
            .map_err(read_err)?
            .ok_or_else(|| StorageError::NotFound("Question not found".to_string()))
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn create_session(&self, session_id: &str) -> Result<Session, StorageError> {
        let created_at = Utc::now();
        sessions::ActiveModel {
            session_id: Set(session_id.to_owned()),
            created_at: Set(created_at.to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(write_err)?;
        Ok(Session {
            session_id: session_id.to_owned(),
            created_at,
        })
    }

    async fn add_question(&self, session_id: &str, content: &str) -> Result<i32, StorageError> {
        if self.find_session(session_id).await?.is_none() {
            return Err(StorageError::NotFound("Session not found".to_string()));
        }
        let row = questions::ActiveModel {
            session_id: Set(session_id.to_owned()),
            content: Set(content.to_owned()),
            answer: Set(None),
            summary: Set(None),
            created_at: Set(Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(write_err)?;
        Ok(row.id)
    }

    async fn get_question(&self, question_id: i32) -> Result<Question, StorageError> {
        into_question(self.find_question(question_id).await?)
    }

    async fn get_answer(&self, question_id: i32) -> Result<Option<String>, StorageError> {
        Ok(self.find_question(question_id).await?.answer)
    }

    async fn get_previous_questions(
        &self,
        session_id: &str,
        question_id: i32,
    ) -> Result<Vec<Question>, StorageError> {
        questions::Entity::find()
            .filter(questions::Column::SessionId.eq(session_id))
            .filter(questions::Column::Id.lt(question_id))
            .order_by_desc(questions::Column::Id)
            .limit(PREVIOUS_QUESTIONS_LIMIT)
            .all(&self.db)
            .await
            .map_err(read_err)?
            .into_iter()
            .map(into_question)
            .collect()
    }

    async fn set_answer(&self, question_id: i32, answer: &str) -> Result<(), StorageError> {
        // The NULL guard keeps concurrent writers from both succeeding
        let written = questions::Entity::update_many()
            .col_expr(questions::Column::Answer, Expr::value(answer.to_owned()))
            .filter(questions::Column::Id.eq(question_id))
            .filter(questions::Column::Answer.is_null())
            .exec(&self.db)
            .await
            .map_err(write_err)?;
        if written.rows_affected == 0 {
            self.find_question(question_id).await?;
            return Err(StorageError::AlreadySet("answer".to_string()));
        }
        Ok(())
    }

    async fn set_summary(&self, question_id: i32, summary: &str) -> Result<(), StorageError> {
        let written = questions::Entity::update_many()
            .col_expr(questions::Column::Summary, Expr::value(summary.to_owned()))
            .filter(questions::Column::Id.eq(question_id))
            .filter(questions::Column::Answer.is_not_null())
            .filter(questions::Column::Summary.is_null())
            .exec(&self.db)
            .await
            .map_err(write_err)?;
        if written.rows_affected > 0 {
            return Ok(());
        }
        let row = self.find_question(question_id).await?;
        if row.answer.is_none() {
            return Err(StorageError::WriteFailed(
                "summary requires a stored answer".to_string(),
            ));
        }
        Err(StorageError::AlreadySet("summary".to_string()))
    }

    async fn save_retrieval_result(
        &self,
        kind: RetrievalKind,
        question_id: i32,
        content: &str,
    ) -> Result<i32, StorageError> {
        self.find_question(question_id).await?;
        let id = match kind {
            RetrievalKind::WebSearch => {
                save_once!(web_search_results, &self.db, question_id, content)
            }
            RetrievalKind::Rag => save_once!(rag_results, &self.db, question_id, content),
            RetrievalKind::Knowledge => {
                save_once!(knowledge_search_results, &self.db, question_id, content)
            }
        };
        debug!("[q:{}] {} result stored as row {}", question_id, kind.as_str(), id);
        Ok(id)
    }

    async fn get_retrieve_data(&self, question_id: i32) -> Result<RetrieveData, StorageError> {
        Ok(RetrieveData {
            web_search_result: content_or_empty!(web_search_results, &self.db, question_id),
            rag_result: content_or_empty!(rag_results, &self.db, question_id),
            knowledge_search_result: content_or_empty!(
                knowledge_search_results,
                &self.db,
                question_id
            ),
        })
    }

    async fn get_api_session(&self, session_id: &str) -> Result<Option<String>, StorageError> {
        Ok(api_sessions::Entity::find()
            .filter(api_sessions::Column::SessionId.eq(session_id))
            .one(&self.db)
            .await
            .map_err(read_err)?
            .map(|row| row.api_session_id))
    }

    async fn create_api_session(
        &self,
        session_id: &str,
        api_session_id: &str,
    ) -> Result<String, StorageError> {
        if let Some(existing) = self.get_api_session(session_id).await? {
            return Ok(existing);
        }
        if self.find_session(session_id).await?.is_none() {
            return Err(StorageError::NotFound("Session not found".to_string()));
        }
        api_sessions::ActiveModel {
            session_id: Set(session_id.to_owned()),
            api_session_id: Set(api_session_id.to_owned()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(write_err)?;
        info!("[s:{}] bound to agent session {}", session_id, api_session_id);
        Ok(api_session_id.to_owned())
    }
}
