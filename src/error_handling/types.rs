use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlError(String),
    #[error("Missing required setting: {0}")]
    MissingSetting(String),
    #[error("Value out of range: {0}")]
    NotInRange(String),
    #[error("Knowledge catalog error: {0}")]
    CatalogError(String),
}

/// Failures of the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Storage write failed: {0}")]
    WriteFailed(String),
    #[error("Storage read failed: {0}")]
    ReadFailed(String),
    /// Referenced session or question does not exist.
    #[error("{0}")]
    NotFound(String),
    /// A write-once column already holds a value.
    #[error("{0} already set")]
    AlreadySet(String),
}

/// Failures reported by the external AI/search capability clients.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),
    #[error("Unexpected upstream response: {0}")]
    Parse(String),
}

/// Error taxonomy surfaced by the tutoring operations.
#[derive(Debug, Error)]
pub enum TutorError {
    #[error("{0}")]
    NotFound(String),
    /// Optional enrichment found nothing; a valid empty result.
    #[error("{0}")]
    NoMatch(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Parse failure: {0}")]
    ParseFailure(String),
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl From<StorageError> for TutorError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => TutorError::NotFound(msg),
            other => TutorError::StorageFailure(other.to_string()),
        }
    }
}

impl From<UpstreamError> for TutorError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unavailable(msg) => TutorError::UpstreamUnavailable(msg),
            UpstreamError::Parse(msg) => TutorError::ParseFailure(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Failed to bind web server: {0}")]
    BindFailed(String),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("Upstream client error: {0}")]
    UpstreamError(#[from] UpstreamError),
    #[error("Web server error: {0}")]
    WebError(#[from] WebError),
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}
