//! Record validation
//!
//! Turns a [`RawEvent`] into a storable [`LogRecord`]. Only a missing level
//! or an empty message is fatal. Every other problem degrades the record:
//! the offending field is omitted (never truncated, never stored malformed)
//! and a diagnostic goes to the side channel.
//!
//! Well-known metadata keys are lifted into their own columns:
//!
//! | key            | column          | limit      |
//! |----------------|-----------------|------------|
//! | `requestId`    | `request_id`    | UUID       |
//! | `userId`       | `user_id`       | UUID       |
//! | `sessionId`    | `session_id`    | 255 chars  |
//! | `method`       | `method`        | 10 chars   |
//! | `url`          | `url`           | none       |
//! | `statusCode`   | `status_code`   | 5 chars    |
//! | `responseTime` | `response_time` | 20 chars   |
//! | `stack`        | `stack`         | none       |
//! | `errorCode`    | `error_code`    | 50 chars   |
//! | `version`      | `version`       | 50 chars   |
//! | `environment`  | `environment`   | 50 chars   |
//! | `service`      | `service`       | 100 chars  |

use super::diagnostics;
use super::error::ValidationError;
use super::record::{LogRecord, Metadata, RawEvent, RawMetadata, RawTimestamp};
use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_SERVICE: &str = "app";

pub const MAX_SESSION_ID_LEN: usize = 255;
pub const MAX_METHOD_LEN: usize = 10;
pub const MAX_STATUS_CODE_LEN: usize = 5;
pub const MAX_RESPONSE_TIME_LEN: usize = 20;
pub const MAX_ERROR_CODE_LEN: usize = 50;
pub const MAX_VERSION_LEN: usize = 50;
pub const MAX_ENVIRONMENT_LEN: usize = 50;
pub const MAX_SERVICE_LEN: usize = 100;

const HYPHENATED_UUID_LEN: usize = 36;

/// Values stamped on every record unless its metadata overrides them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDefaults {
    pub environment: String,
    pub service: String,
    pub version: Option<String>,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            version: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordValidator {
    defaults: RecordDefaults,
}

impl RecordValidator {
    pub fn new(defaults: RecordDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &RecordDefaults {
        &self.defaults
    }

    pub fn validate(&self, raw: RawEvent) -> Result<LogRecord, ValidationError> {
        let level = raw.level.ok_or(ValidationError::MissingLevel)?;
        let message = match raw.message {
            Some(message) if !message.trim().is_empty() => message,
            _ => return Err(ValidationError::EmptyMessage),
        };

        let mut record = LogRecord::new(level, message);
        record.timestamp = resolve_timestamp(raw.timestamp);
        record.environment = self.defaults.environment.clone();
        record.service = self.defaults.service.clone();
        record.version = self.defaults.version.clone();

        if let Some(mut metadata) = resolve_metadata(raw.metadata) {
            lift_known_fields(&mut metadata, &mut record);
            if !metadata.is_empty() {
                record.metadata = Some(metadata);
            }
        }

        Ok(record)
    }
}

/// Whether a timestamp fits the store's millisecond column and year range
pub fn is_storable_timestamp(timestamp: &DateTime<Utc>) -> bool {
    timestamp.timestamp_millis() >= 0 && timestamp.year() <= 9999
}

fn resolve_timestamp(raw: Option<RawTimestamp>) -> DateTime<Utc> {
    let parsed = match raw {
        None => return Utc::now(),
        Some(RawTimestamp::Millis(ms)) => DateTime::from_timestamp_millis(ms),
        Some(RawTimestamp::Text(text)) => parse_timestamp_text(&text),
        Some(RawTimestamp::At(at)) => Some(at),
    };

    match parsed.filter(is_storable_timestamp) {
        Some(timestamp) => timestamp,
        None => {
            diagnostics::field_omitted("timestamp", "invalid timestamp replaced with now");
            Utc::now()
        }
    }
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    text.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

fn resolve_metadata(raw: Option<RawMetadata>) -> Option<Metadata> {
    match raw? {
        RawMetadata::Structured(Value::Null) => None,
        RawMetadata::Structured(Value::Object(map)) => Some(map),
        RawMetadata::Structured(other) => {
            let mut map = Metadata::new();
            map.insert("value".to_string(), other);
            Some(map)
        }
        RawMetadata::Unserializable(error) => {
            diagnostics::metadata_dropped(&error);
            None
        }
    }
}

fn lift_known_fields(metadata: &mut Metadata, record: &mut LogRecord) {
    if let Some(value) = metadata.remove("requestId") {
        record.request_id = uuid_field("requestId", &value);
    }
    if let Some(value) = metadata.remove("userId") {
        record.user_id = uuid_field("userId", &value);
    }
    if let Some(value) = metadata.remove("sessionId") {
        record.session_id = bounded_field("sessionId", scalar_text(&value), MAX_SESSION_ID_LEN);
    }
    if let Some(value) = metadata.remove("method") {
        record.method = bounded_field("method", scalar_text(&value), MAX_METHOD_LEN);
    }
    if let Some(value) = metadata.remove("url") {
        record.url = unbounded_field("url", scalar_text(&value));
    }
    if let Some(value) = metadata.remove("statusCode") {
        record.status_code = bounded_field("statusCode", scalar_text(&value), MAX_STATUS_CODE_LEN);
    }
    if let Some(value) = metadata.remove("responseTime") {
        let text = match &value {
            Value::Number(n) => Some(format!("{}ms", n)),
            other => scalar_text(other),
        };
        record.response_time = bounded_field("responseTime", text, MAX_RESPONSE_TIME_LEN);
    }
    if let Some(value) = metadata.remove("stack") {
        record.stack = unbounded_field("stack", scalar_text(&value));
    }
    if let Some(value) = metadata.remove("errorCode") {
        record.error_code = bounded_field("errorCode", scalar_text(&value), MAX_ERROR_CODE_LEN);
    }
    if let Some(value) = metadata.remove("version") {
        if let Some(version) = bounded_field("version", scalar_text(&value), MAX_VERSION_LEN) {
            record.version = Some(version);
        }
    }
    if let Some(value) = metadata.remove("environment") {
        if let Some(env) = bounded_field("environment", scalar_text(&value), MAX_ENVIRONMENT_LEN) {
            record.environment = env;
        }
    }
    if let Some(value) = metadata.remove("service") {
        if let Some(service) = bounded_field("service", scalar_text(&value), MAX_SERVICE_LEN) {
            record.service = service;
        }
    }
}

/// Text form of a scalar JSON value; `None` for null, empty, arrays and objects
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn uuid_field(field: &'static str, value: &Value) -> Option<Uuid> {
    let parsed = value
        .as_str()
        .filter(|s| s.len() == HYPHENATED_UUID_LEN)
        .and_then(|s| Uuid::try_parse(s).ok());

    if parsed.is_none() && !value.is_null() {
        diagnostics::field_omitted(field, "not a valid UUID");
    }
    parsed
}

fn bounded_field(field: &'static str, text: Option<String>, max_chars: usize) -> Option<String> {
    let text = unbounded_field(field, text)?;
    if text.chars().count() > max_chars {
        diagnostics::field_omitted(field, "exceeds maximum length");
        return None;
    }
    Some(text)
}

fn unbounded_field(field: &'static str, text: Option<String>) -> Option<String> {
    if text.is_none() {
        diagnostics::field_omitted(field, "not a non-empty scalar");
    }
    text
}
