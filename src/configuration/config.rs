use std::net::SocketAddr;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::types::*;
use crate::error_handling::types::ConfigError;

/// Application configuration.
///
/// Read from a TOML file whose path is given on the command line. Every table
/// is optional and falls back to its defaults:
///
/// ```toml
/// [server]
/// bind_address = "0.0.0.0"
/// port = 5000
///
/// [completion]
/// api_key = "sk-..."
///
/// [agent]
/// api_key = "sk-..."
/// app_id = "..."
///
/// [web_search]
/// api_key = "..."
///
/// [knowledge]
/// catalog_path = "/srv/tutor/knowledge.json"
/// ```
///
/// Secrets and endpoints may also come from the environment, which takes
/// precedence over the file (see [`Config::ENV_OVERRIDES`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub knowledge: KnowledgeSettings,
    pub completion: CompletionSettings,
    pub agent: AgentSettings,
    pub web_search: WebSearchSettings,
    pub summarizer: SummarizerSettings,
    pub recommendation: RecommendationSettings,
}

impl Config {
    /// Environment variables honoured by [`Config::apply_env_overrides`].
    pub const ENV_OVERRIDES: [&'static str; 8] = [
        "QWEN_API_KEY",
        "QWEN_BASE_URL",
        "DASHSCOPE_API_KEY",
        "LONG_SESSION_AGENT_ID",
        "ZHIPU_API_KEY",
        "ZHIPU_BASE_URL",
        "DATABASE_URL",
        "KNOWLEDGE_CATALOG_PATH",
    ];

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    /// Loads the file, applies process environment overrides and validates.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&raw)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Overrides file values with whatever `lookup` returns for the keys in
    /// [`Config::ENV_OVERRIDES`]. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in Self::ENV_OVERRIDES {
            let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            debug!("Configuration override from {}", key);
            match key {
                "QWEN_API_KEY" => self.completion.api_key = value,
                "QWEN_BASE_URL" => self.completion.base_url = value,
                "DASHSCOPE_API_KEY" => self.agent.api_key = value,
                "LONG_SESSION_AGENT_ID" => self.agent.app_id = value,
                "ZHIPU_API_KEY" => self.web_search.api_key = value,
                "ZHIPU_BASE_URL" => self.web_search.endpoint = value,
                "DATABASE_URL" => self.storage.database_url = value,
                "KNOWLEDGE_CATALOG_PATH" => self.knowledge.catalog_path = value.into(),
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("completion.api_key", &self.completion.api_key),
            ("agent.api_key", &self.agent.api_key),
            ("agent.app_id", &self.agent.app_id),
            ("web_search.api_key", &self.web_search.api_key),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::MissingSetting(name.to_string()));
        }

        let counts = [
            ("summarizer.workers", self.summarizer.workers as u64),
            ("summarizer.queue_capacity", self.summarizer.queue_capacity as u64),
            ("recommendation.max_items", self.recommendation.max_items as u64),
            ("completion.timeout_secs", self.completion.timeout_secs),
            ("agent.timeout_secs", self.agent.timeout_secs),
            ("web_search.timeout_secs", self.web_search.timeout_secs),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::NotInRange(format!("{name} must be greater than 0")));
        }

        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.bind_address, self.server.port)
            .parse()
            .map_err(|_| {
                ConfigError::NotInRange(format!(
                    "invalid bind address {}:{}",
                    self.server.bind_address, self.server.port
                ))
            })
    }
}
