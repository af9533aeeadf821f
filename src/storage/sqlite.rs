//! SQLite log store
//!
//! This module provides async database operations with:
//! - Connection pooling
//! - Automatic migrations
//! - Transactional batch inserts
//! - WAL mode for concurrent reads/writes

use super::LogStore;
use crate::pipeline::{LogLevel, LogRecord, Metadata, StorageError, StoredLog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Row, Sqlite};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

pub(crate) const SELECT_COLUMNS: &str = "SELECT id, level, message, timestamp, metadata, \
     request_id, user_id, session_id, method, url, status_code, response_time, stack, \
     error_code, environment, service, version FROM app_logs";

const INSERT_SQL: &str = "INSERT INTO app_logs (level, message, timestamp, metadata, \
     request_id, user_id, session_id, method, url, status_code, response_time, stack, \
     error_code, environment, service, version) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Row counts reported by [`SqliteLogStore::stats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: u64,
    pub by_level: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<DateTime<Utc>>,
}

/// Log store backed by a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqliteLogStore {
    pool: SqlitePool,
}

impl SqliteLogStore {
    /// Connect and run migrations
    ///
    /// ```ignore
    /// let store = SqliteLogStore::new("sqlite:./data/logs.db", 5).await?;
    /// ```
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .pragma("synchronous", "NORMAL");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::Database(format!("migration failed: {}", e)))?;

        tracing::info!(database_url = %database_url, "Log store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert one record and return it with its row id
    pub async fn insert_one(&self, record: &LogRecord) -> Result<StoredLog, StorageError> {
        let result = bind_record(sqlx::query(INSERT_SQL), record)
            .execute(&self.pool)
            .await?;

        Ok(StoredLog {
            id: result.last_insert_rowid(),
            record: record.clone(),
        })
    }

    /// Delete records whose timestamp is older than `days` days
    ///
    /// A cutoff before the Unix epoch matches nothing, since stored
    /// timestamps are never negative.
    pub async fn delete_older_than(&self, days: u32) -> Result<u64, StorageError> {
        let cutoff = chrono::TimeDelta::try_days(i64::from(days))
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .filter(|cutoff| cutoff.timestamp_millis() > 0);
        let Some(cutoff) = cutoff else {
            return Ok(0);
        };

        let result = sqlx::query("DELETE FROM app_logs WHERE timestamp < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Cheap connectivity check
    pub async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Reclaim disk space after large deletes
    pub async fn vacuum(&self) -> Result<(), StorageError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<StoreStats, StorageError> {
        let levels: Vec<(String, i64)> =
            sqlx::query_as("SELECT level, COUNT(*) FROM app_logs GROUP BY level")
                .fetch_all(&self.pool)
                .await?;

        let (oldest, newest): (Option<i64>, Option<i64>) =
            sqlx::query_as("SELECT MIN(timestamp), MAX(timestamp) FROM app_logs")
                .fetch_one(&self.pool)
                .await?;

        let by_level: BTreeMap<String, u64> = levels
            .into_iter()
            .map(|(level, count)| (level, count as u64))
            .collect();

        Ok(StoreStats {
            total: by_level.values().sum(),
            by_level,
            oldest: oldest.and_then(DateTime::from_timestamp_millis),
            newest: newest.and_then(DateTime::from_timestamp_millis),
        })
    }
}

#[async_trait]
impl LogStore for SqliteLogStore {
    /// All records in one transaction
    async fn insert_many(&self, records: &[LogRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            bind_record(sqlx::query(INSERT_SQL), record)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}

fn bind_record<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    record: &'q LogRecord,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(record.level.as_str())
        .bind(&record.message)
        .bind(record.timestamp.timestamp_millis())
        .bind(record.metadata_json())
        .bind(record.request_id.map(|id| id.to_string()))
        .bind(record.user_id.map(|id| id.to_string()))
        .bind(&record.session_id)
        .bind(&record.method)
        .bind(&record.url)
        .bind(&record.status_code)
        .bind(&record.response_time)
        .bind(&record.stack)
        .bind(&record.error_code)
        .bind(&record.environment)
        .bind(&record.service)
        .bind(&record.version)
}

/// Decode a row selected with [`SELECT_COLUMNS`]
pub(crate) fn stored_log_from_row(row: &SqliteRow) -> StoredLog {
    let level: String = row.get("level");
    let metadata: Option<String> = row.get("metadata");
    let request_id: Option<String> = row.get("request_id");
    let user_id: Option<String> = row.get("user_id");

    StoredLog {
        id: row.get("id"),
        record: LogRecord {
            level: LogLevel::from_str(&level).unwrap_or(LogLevel::Info),
            message: row.get("message"),
            timestamp: DateTime::from_timestamp_millis(row.get("timestamp")).unwrap_or_default(),
            metadata: metadata.and_then(|m| serde_json::from_str::<Metadata>(&m).ok()),
            request_id: request_id.and_then(|id| Uuid::parse_str(&id).ok()),
            user_id: user_id.and_then(|id| Uuid::parse_str(&id).ok()),
            session_id: row.get("session_id"),
            method: row.get("method"),
            url: row.get("url"),
            status_code: row.get("status_code"),
            response_time: row.get("response_time"),
            stack: row.get("stack"),
            error_code: row.get("error_code"),
            version: row.get("version"),
            environment: row.get("environment"),
            service: row.get("service"),
        },
    }
}
