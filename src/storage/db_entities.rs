//! SeaORM entity models used by the database storage backend.
//!
//! These structs map to the SQLite tables created by `database_storage`:
//! - `sessions`: one row per chat session token
//! - `questions`: user questions, their streamed answer and background summary
//! - `web_search_results`, `rag_results`, `knowledge_search_results`: one
//!   serialized retrieval blob per question and kind
//! - `api_sessions`: binding of a local session to the external agent session

use sea_orm::entity::prelude::*;

/// Sessions table entity model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Auto-increment row id
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Opaque session token handed to the client
    #[sea_orm(unique)]
    pub session_id: String,
    /// RFC3339 creation timestamp
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Related<self::questions::Entity> for Entity {
    fn to() -> RelationDef {
        self::questions::Relation::Session.def()
    }
}

impl Related<self::api_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        self::api_sessions::Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Questions table entity models.
pub mod questions {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "questions")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        /// Foreign key to `sessions.session_id`
        pub session_id: String,
        /// JSON-serialized `QuestionContent`
        #[sea_orm(column_type = "Text")]
        pub content: String,
        #[sea_orm(column_type = "Text", nullable)]
        pub answer: Option<String>,
        #[sea_orm(column_type = "Text", nullable)]
        pub summary: Option<String>,
        pub created_at: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::Entity",
            from = "Column::SessionId",
            to = "super::Column::SessionId"
        )]
        Session,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Web search results, one per question.
pub mod web_search_results {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "web_search_results")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub question_id: i32,
        #[sea_orm(column_type = "Text")]
        pub content: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::questions::Entity",
            from = "Column::QuestionId",
            to = "super::questions::Column::Id"
        )]
        Question,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// RAG results, one per question.
pub mod rag_results {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "rag_results")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub question_id: i32,
        #[sea_orm(column_type = "Text")]
        pub content: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::questions::Entity",
            from = "Column::QuestionId",
            to = "super::questions::Column::Id"
        )]
        Question,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Knowledge catalog hits, one per question.
pub mod knowledge_search_results {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "knowledge_search_results")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub question_id: i32,
        #[sea_orm(column_type = "Text")]
        pub content: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::questions::Entity",
            from = "Column::QuestionId",
            to = "super::questions::Column::Id"
        )]
        Question,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// External conversational-agent session bindings.
pub mod api_sessions {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "api_sessions")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        /// Foreign key to `sessions.session_id`; at most one binding per session
        #[sea_orm(unique)]
        pub session_id: String,
        /// Session id reported by the external agent
        pub api_session_id: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::Entity",
            from = "Column::SessionId",
            to = "super::Column::SessionId"
        )]
        Session,
    }

    impl ActiveModelBehavior for ActiveModel {}
}
