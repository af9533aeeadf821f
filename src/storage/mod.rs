//! Relational storage for log records
//!
//! The pipeline only needs [`LogStore::insert_many`]. The SQLite
//! implementation additionally serves the operational HTTP/CLI surface
//! (query, manual insert, purge, retention).

pub mod cleanup;
pub mod query;
pub mod sqlite;

use crate::pipeline::{LogRecord, StorageError};
use async_trait::async_trait;

pub use cleanup::{run_cleanup_now, spawn_cleanup_task, CleanupConfig};
pub use query::{LogFilter, LogPage, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
pub use sqlite::{SqliteLogStore, StoreStats};

/// Sink for validated log records
///
/// `insert_many` is all-or-nothing: on `Err`, none of the records passed to
/// that call may be considered persisted.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert_many(&self, records: &[LogRecord]) -> Result<(), StorageError>;
}
