use thiserror::Error;

use lichen_model::AgentName;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller named an agent the registry does not know. A caller or
    /// configuration bug, never a runtime race; not retryable.
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentName),

    /// The registry or prerequisite table is internally inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A collaborator (result store, job queue) failed to answer. Retryable.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Whether the caller may retry the request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::Unavailable(_) | ScanError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
