//! Errors surfaced by the workflow engine

use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DatabaseError;

/// Errors that can occur while working with workflow entities
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Payload or input missing required fields
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity or location id is unknown
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: i64 },

    /// Target status is not reachable from the current status
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Stored data does not allow the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Wizard lock held by another session
    #[error("Location {location_id} is locked by session {owner}")]
    LockConflict { location_id: i64, owner: String },

    /// Underlying storage failure
    #[error(transparent)]
    Persistence(#[from] DatabaseError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }

    pub fn not_found(kind: impl Into<String>, id: i64) -> Self {
        WorkflowError::NotFound {
            kind: kind.into(),
            id,
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        WorkflowError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkflowError::NotFound { .. })
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, WorkflowError::InvalidTransition { .. })
    }

    /// Unrecoverable storage conditions, as opposed to errors the user can fix
    pub fn is_fatal(&self) -> bool {
        match self {
            WorkflowError::Persistence(err) => err.is_fatal(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        WorkflowError::Persistence(err.into())
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Persistence(DatabaseError::type_error(format!(
            "invalid JSON column: {}",
            err
        )))
    }
}

impl From<ConfigError> for WorkflowError {
    fn from(err: ConfigError) -> Self {
        WorkflowError::Config(err.to_string())
    }
}

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WorkflowError::invalid_transition("pending", "completed");
        assert_eq!(
            err.to_string(),
            "Invalid state transition from pending to completed"
        );

        let err = WorkflowError::not_found("purchase_request", 7);
        assert_eq!(err.to_string(), "purchase_request not found: 7");
    }

    #[test]
    fn test_fatal_classification() {
        let err: WorkflowError = sqlx::Error::PoolClosed.into();
        assert!(err.is_fatal());

        assert!(!WorkflowError::validation("notes are required").is_fatal());
        assert!(!WorkflowError::from(sqlx::Error::RowNotFound).is_fatal());
    }
}
