//! Background retention task
//!
//! Deletes log records older than the configured number of days, once a day
//! at a fixed local hour.

use super::sqlite::SqliteLogStore;
use crate::pipeline::StorageError;
use chrono::{Datelike, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Cleanup configuration
#[derive(Debug, Clone, Copy)]
pub struct CleanupConfig {
    /// Records older than this many days are deleted
    pub days: u32,

    /// Hour of day to run cleanup (0-23)
    pub cleanup_hour: u32,

    /// How often to check whether it is cleanup time
    pub check_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            days: 30,
            cleanup_hour: 3,
            check_interval: Duration::from_secs(3600),
        }
    }
}

/// Spawn background cleanup task
///
/// ```ignore
/// let config = CleanupConfig { days: 14, ..Default::default() };
/// spawn_cleanup_task(store.clone(), config);
/// ```
pub fn spawn_cleanup_task(
    store: Arc<SqliteLogStore>,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        cleanup_loop(store, config).await;
    })
}

async fn cleanup_loop(store: Arc<SqliteLogStore>, config: CleanupConfig) {
    let mut interval = time::interval(config.check_interval);
    let mut last_cleanup_day: Option<u32> = None;

    loop {
        interval.tick().await;

        let now = chrono::Local::now();
        let current_day = now.ordinal();

        if now.hour() == config.cleanup_hour && Some(current_day) != last_cleanup_day {
            tracing::info!(
                cleanup_hour = config.cleanup_hour,
                days = config.days,
                "Starting scheduled log cleanup"
            );

            match run_cleanup_now(&store, config.days).await {
                Ok(_) => last_cleanup_day = Some(current_day),
                Err(e) => tracing::error!(error = %e, "Log cleanup failed"),
            }
        }
    }
}

/// Delete records older than `days` and reclaim the space
///
/// Returns the number of deleted records.
pub async fn run_cleanup_now(store: &SqliteLogStore, days: u32) -> Result<u64, StorageError> {
    let deleted = store.delete_older_than(days).await?;

    if deleted > 0 {
        // VACUUM cannot run inside a transaction
        store.vacuum().await?;
    }

    tracing::info!(deleted, days, "Log cleanup completed");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{LogLevel, LogRecord};
    use crate::storage::LogStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_run_cleanup_now() {
        let store = SqliteLogStore::new("sqlite::memory:", 1).await.unwrap();

        let mut old = LogRecord::new(LogLevel::Info, "Old message");
        old.timestamp = Utc::now() - chrono::Duration::days(90);
        let recent = LogRecord::new(LogLevel::Info, "Recent message");
        store.insert_many(&[old, recent]).await.unwrap();

        assert_eq!(run_cleanup_now(&store, 30).await.unwrap(), 1);
        assert_eq!(run_cleanup_now(&store, 30).await.unwrap(), 0);
        assert_eq!(store.stats().await.unwrap().total, 1);
    }

    #[test]
    fn test_cleanup_config_default() {
        let config = CleanupConfig::default();
        assert_eq!(config.days, 30);
        assert_eq!(config.cleanup_hour, 3);
        assert_eq!(config.check_interval, Duration::from_secs(3600));
    }
}
