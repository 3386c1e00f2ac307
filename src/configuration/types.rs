use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::storage::DatabaseStorage;

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the HTTP API binds to
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SeaORM connection string, `sqlite://<file>?mode=rwc` creates the file
    pub database_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: format!("sqlite://{}?mode=rwc", DatabaseStorage::DEFAULT_DB_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    /// JSON catalog of knowledge categories, loaded once at start-up
    pub catalog_path: PathBuf,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("knowledge.json"),
        }
    }
}

/// OpenAI-compatible text completion endpoint (Qwen).
///
/// Used for classification, keyword extraction, summaries and recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub base_url: String,
    pub api_key: String,
    /// Model for classification and summaries
    pub model: String,
    pub recommendation_model: String,
    pub timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            api_key: String::new(),
            model: "qwen-plus".to_string(),
            recommendation_model: "qwen-max".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Long-session conversational agent (DashScope application).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub base_url: String,
    pub api_key: String,
    pub app_id: String,
    /// Upper bound for a whole streamed answer
    pub timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/api/v1".to_string(),
            api_key: String::new(),
            app_id: String::new(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchSettings {
    /// Full URL of the tools endpoint
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://open.bigmodel.cn/api/paas/v4/tools".to_string(),
            api_key: String::new(),
            timeout_secs: 300,
        }
    }
}

/// Background summary pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    pub workers: usize,
    /// Pending jobs beyond this are dropped with a warning
    pub queue_capacity: usize,
    /// Overrides `completion.model` for summaries
    pub model: Option<String>,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 64,
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationSettings {
    pub max_items: usize,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self { max_items: 3 }
    }
}
