//! Database error types and handling
//!
//! Classifies sqlx failures so callers can tell constraint problems apart
//! from an unreachable or broken store.

use thiserror::Error;

/// Storage failure, classified from `sqlx::Error`
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Database file unreachable or misconfigured
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// Unique, foreign key or check constraint, or a write to a history ledger
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Column value could not be encoded or decoded
    #[error("Data type error: {0}")]
    TypeError(String),

    #[error("Migration failed: {0}")]
    MigrationError(String),

    /// SQLite busy or locked; the statement can be retried
    #[error("Transaction failed: {0}")]
    TransactionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    /// Row shape does not match the model
    #[error("Row mapping error: {0}")]
    RowMappingError(String),

    #[error("Connection pool error: {0}")]
    PoolError(String),

    #[error("Database error: {0}")]
    Other(String),
}

impl DatabaseError {
    pub fn not_found(context: impl Into<String>) -> Self {
        DatabaseError::NotFound(context.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        DatabaseError::ConstraintViolation(msg.into())
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        DatabaseError::TypeError(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DatabaseError::ConstraintViolation(_))
    }

    /// The store itself is unusable, as opposed to one statement being rejected
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionError(_)
                | DatabaseError::PoolError(_)
                | DatabaseError::MigrationError(_)
        )
    }
}

/// Result type for database operations
pub type DbResult<T> = std::result::Result<T, DatabaseError>;

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("no matching row".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                    || message.contains("append-only")
                {
                    DatabaseError::ConstraintViolation(message)
                } else if message.contains("database is locked") || message.contains("busy") {
                    DatabaseError::TransactionError(message)
                } else {
                    DatabaseError::QueryError(message)
                }
            }
            sqlx::Error::ColumnNotFound(col) => {
                DatabaseError::RowMappingError(format!("missing column {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                DatabaseError::RowMappingError(format!("column index {} out of {}", index, len))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DatabaseError::TypeError(format!("column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DatabaseError::TypeError(source.to_string()),
            sqlx::Error::Configuration(msg) => DatabaseError::ConnectionError(msg.to_string()),
            sqlx::Error::Io(err) => DatabaseError::ConnectionError(err.to_string()),
            sqlx::Error::PoolTimedOut => {
                DatabaseError::PoolError("timed out waiting for a connection".to_string())
            }
            sqlx::Error::PoolClosed => DatabaseError::PoolError("pool is closed".to_string()),
            sqlx::Error::Migrate(err) => DatabaseError::MigrationError(err.to_string()),
            err => DatabaseError::Other(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationError(err.to_string())
    }
}
