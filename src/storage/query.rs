//! Filtered log queries for the HTTP and CLI surface

use super::sqlite::{stored_log_from_row, SqliteLogStore, SELECT_COLUMNS};
use crate::pipeline::{LogLevel, StorageError, StoredLog};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

pub const DEFAULT_QUERY_LIMIT: u32 = 100;
pub const MAX_QUERY_LIMIT: u32 = 1000;

/// Filter for log queries
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub user_id: Option<Uuid>,
    /// Only records at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Defaults to [`DEFAULT_QUERY_LIMIT`], capped at [`MAX_QUERY_LIMIT`]
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl LogFilter {
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT)
    }

    fn push_conditions(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1=1");

        if let Some(level) = self.level {
            builder.push(" AND level = ").push_bind(level.as_str());
        }
        if let Some(user_id) = self.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.to_string());
        }
        if let Some(since) = self.since {
            builder
                .push(" AND timestamp >= ")
                .push_bind(since.timestamp_millis());
        }
    }
}

/// One page of query results, newest first
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub logs: Vec<StoredLog>,
    /// Matching rows ignoring limit and offset
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl SqliteLogStore {
    /// Query logs with filtering and pagination
    ///
    /// ```ignore
    /// let filter = LogFilter {
    ///     level: Some(LogLevel::Error),
    ///     since: Some(Utc::now() - chrono::Duration::hours(1)),
    ///     ..Default::default()
    /// };
    /// let page = store.query_logs(filter).await?;
    /// ```
    pub async fn query_logs(&self, filter: LogFilter) -> Result<LogPage, StorageError> {
        let limit = filter.effective_limit();
        let offset = filter.offset.unwrap_or(0);

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        filter.push_conditions(&mut select);
        select
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));

        let rows = select.build().fetch_all(self.pool()).await?;
        let logs = rows.iter().map(stored_log_from_row).collect();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM app_logs");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool()).await?;

        Ok(LogPage {
            logs,
            total: total as u64,
            limit,
            offset,
        })
    }
}
