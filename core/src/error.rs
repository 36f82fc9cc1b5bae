/// Error types for the messaging core
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Validation error: {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Message must have text or at least one attachment")]
    EmptyMessage,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Stale version: expected {expected}, conversation is at {actual}")]
    StaleVersion { expected: u64, actual: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

impl WorkspaceError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// True for caller-input failures (builder, composer, send preconditions).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::EmptyMessage)
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;
