//! Log records HTTP API
//!
//! Read, write and purge access to the same store the pipeline writes to.
//! Manual records bypass the buffer: they are validated with the logger's
//! validator and inserted immediately.

use super::AppState;
use crate::error::AppError;
use crate::pipeline::{LogLevel, RawEvent, RawMetadata, RawTimestamp, RequestLogger, StoredLog};
use crate::storage::{LogFilter, LogPage};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

const DEFAULT_PURGE_DAYS: u32 = 30;

/// Query parameters for GET /api/logs
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQueryParams {
    pub level: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub user_id: Option<String>,
    /// RFC 3339 or Unix milliseconds
    pub since: Option<String>,
}

impl LogQueryParams {
    fn into_filter(self) -> Result<LogFilter, AppError> {
        let level = self
            .level
            .map(|l| l.parse::<LogLevel>())
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let user_id = self
            .user_id
            .map(|id| Uuid::try_parse(&id))
            .transpose()
            .map_err(|_| AppError::BadRequest("userId must be a UUID".to_string()))?;

        let since = self.since.map(|s| parse_since(&s)).transpose()?;

        Ok(LogFilter {
            level,
            user_id,
            since,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

fn parse_since(text: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    text.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "since must be RFC 3339 or Unix milliseconds, got '{}'",
                text
            ))
        })
}

/// Body of POST /api/logs
#[derive(Debug, Deserialize)]
pub struct CreateLogRequest {
    pub level: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Any JSON value; anything unusable is replaced with the current time
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Timestamp as the validator expects it
///
/// Integers are Unix milliseconds and strings are parsed later. Other values
/// become text that fails parsing, so the validator substitutes now.
fn raw_timestamp(value: Value) -> Option<RawTimestamp> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(RawTimestamp::Text(text)),
        Value::Number(n) => match n.as_i64() {
            Some(ms) => Some(RawTimestamp::Millis(ms)),
            None => Some(RawTimestamp::Text(n.to_string())),
        },
        other => Some(RawTimestamp::Text(other.to_string())),
    }
}

/// Query parameters for DELETE /api/logs
#[derive(Debug, Deserialize)]
pub struct PurgeParams {
    pub days: Option<u32>,
}

/// GET /api/logs - Query logs with filtering
///
/// Example: GET /api/logs?level=error&limit=10&since=2025-06-01T00:00:00Z
pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<LogPage>, AppError> {
    let filter = params.into_filter()?;
    let page = state.store.query_logs(filter).await?;
    Ok(Json(page))
}

/// POST /api/logs - Insert one record directly
pub async fn create_log(
    State(state): State<AppState>,
    Json(body): Json<CreateLogRequest>,
) -> Result<(StatusCode, Json<StoredLog>), AppError> {
    let level = body
        .level
        .map(|l| l.parse::<LogLevel>())
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let event = RawEvent {
        level,
        message: body.message,
        timestamp: body.timestamp.and_then(raw_timestamp),
        metadata: body.metadata.map(RawMetadata::Structured),
    };

    let record = state.logger.validator().validate(event)?;
    let stored = state.store.insert_one(&record).await?;

    Ok((StatusCode::CREATED, Json(stored)))
}

/// DELETE /api/logs?days=N - Purge records older than N days
pub async fn purge_logs(
    State(state): State<AppState>,
    Extension(request_logger): Extension<RequestLogger>,
    Query(params): Query<PurgeParams>,
) -> Result<impl IntoResponse, AppError> {
    let days = params.days.unwrap_or(DEFAULT_PURGE_DAYS);
    if days == 0 {
        return Err(AppError::BadRequest("days must be at least 1".to_string()));
    }

    let deleted = state.store.delete_older_than(days).await?;
    request_logger.info(
        "Purged old log records",
        Some(json!({ "deleted": deleted, "days": days })),
    );

    Ok(Json(json!({ "deleted": deleted, "days": days })))
}

/// GET /api/logs/stats - Pipeline counters and stored row counts
pub async fn log_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let store = state.store.stats().await?;

    Ok(Json(json!({
        "pipeline": state.logger.stats(),
        "buffered": state.logger.buffered(),
        "store": store,
    })))
}
