//! Error types shared across the service.

pub mod types;

pub use types::{ConfigError, ControllerError, StorageError, TutorError, UpstreamError, WebError};
