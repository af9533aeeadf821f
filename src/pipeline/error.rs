//! Error types for the log pipeline
//!
//! None of these ever reach code that calls the logging API: validation
//! errors are swallowed by the logger, storage errors are absorbed by the
//! flush executor, shutdown errors go to the host that owns the lifecycle.

use std::time::Duration;
use thiserror::Error;

/// Raised when a raw event lacks a required field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("log event has no level")]
    MissingLevel,

    #[error("log event has an empty message")]
    EmptyMessage,
}

/// Failure reported by a [`LogStore`](crate::storage::LogStore)
#[derive(Debug, Error)]
pub enum StorageError {
    /// A row violated a table constraint
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(String),

    /// A record could not be encoded for storage
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => match db.kind() {
                sqlx::error::ErrorKind::Other => StorageError::Database(db.to_string()),
                _ => StorageError::Constraint(db.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Unavailable(err.to_string())
            }
            sqlx::Error::Encode(e) => StorageError::Encoding(e.to_string()),
            other => StorageError::Database(other.to_string()),
        }
    }
}

/// Raised by `shutdown()` when the final flush did not complete cleanly
#[derive(Debug, Error)]
pub enum ShutdownFlushError {
    #[error("final flush did not finish within {0:?}")]
    Timeout(Duration),

    #[error("flush task failed: {0}")]
    TaskFailed(String),
}
