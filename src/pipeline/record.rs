//! Log record types
//!
//! `RawEvent` is what callers hand to the pipeline; `LogRecord` is the
//! validated, storable unit. Metadata is a JSON object, so anything that made
//! it into a `LogRecord` is serializable by construction.

use super::level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Structured metadata attached to a record
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata as supplied by a caller, before validation
#[derive(Debug, Clone, PartialEq)]
pub enum RawMetadata {
    /// Structural copy succeeded
    Structured(Value),
    /// Structural copy failed; carries the serializer error
    Unserializable(String),
}

/// Caller-supplied timestamp, validated later
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Unix milliseconds
    Millis(i64),
    /// RFC 3339 text or a decimal millisecond string
    Text(String),
    #[serde(skip)]
    At(DateTime<Utc>),
}

/// Unvalidated log event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEvent {
    pub level: Option<LogLevel>,
    pub message: Option<String>,
    pub timestamp: Option<RawTimestamp>,
    pub metadata: Option<RawMetadata>,
}

impl RawEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level: Some(level),
            message: Some(message.into()),
            timestamp: None,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(RawMetadata::Structured(Value::Object(metadata)));
        self
    }

    /// Attach any serializable value as metadata
    ///
    /// Serialization happens here; a failure is remembered and the validator
    /// drops the metadata instead of rejecting the whole event.
    pub fn with_serialized_metadata<T: Serialize + ?Sized>(mut self, metadata: &T) -> Self {
        self.metadata = Some(match serde_json::to_value(metadata) {
            Ok(value) => RawMetadata::Structured(value),
            Err(e) => RawMetadata::Unserializable(e.to_string()),
        });
        self
    }

    pub fn with_timestamp(mut self, timestamp: RawTimestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Validated record, the unit persisted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub environment: String,
    pub service: String,
}

impl LogRecord {
    /// Bare record with only the required fields set
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            metadata: None,
            request_id: None,
            user_id: None,
            session_id: None,
            method: None,
            url: None,
            status_code: None,
            response_time: None,
            stack: None,
            error_code: None,
            version: None,
            environment: super::validator::DEFAULT_ENVIRONMENT.to_string(),
            service: super::validator::DEFAULT_SERVICE.to_string(),
        }
    }

    /// Metadata serialized for storage
    pub fn metadata_json(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|m| serde_json::to_string(m).ok())
    }
}

/// A record read back from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredLog {
    pub id: i64,
    #[serde(flatten)]
    pub record: LogRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_serialized_metadata_failure_is_remembered() {
        // JSON object keys must be strings
        let mut bad: HashMap<Vec<u8>, u32> = HashMap::new();
        bad.insert(vec![1, 2], 3);

        let event = RawEvent::new(LogLevel::Info, "x").with_serialized_metadata(&bad);
        assert!(matches!(event.metadata, Some(RawMetadata::Unserializable(_))));
    }

    #[test]
    fn test_serialized_metadata_success() {
        let mut good = HashMap::new();
        good.insert("route", "/about");

        let event = RawEvent::new(LogLevel::Info, "x").with_serialized_metadata(&good);
        match event.metadata {
            Some(RawMetadata::Structured(Value::Object(map))) => {
                assert_eq!(map["route"], "/about");
            }
            other => panic!("unexpected metadata: {:?}", other),
        }
    }

    #[test]
    fn test_raw_timestamp_untagged() {
        let ts: RawTimestamp = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(ts, RawTimestamp::Millis(1_700_000_000_000));

        let ts: RawTimestamp = serde_json::from_str("\"2024-01-20T12:00:00Z\"").unwrap();
        assert_eq!(ts, RawTimestamp::Text("2024-01-20T12:00:00Z".to_string()));
    }

    #[test]
    fn test_record_serializes_camel_case_and_skips_empty() {
        let mut record = LogRecord::new(LogLevel::Warn, "slow");
        record.status_code = Some("404".to_string());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["level"], "warn");
        assert_eq!(json["statusCode"], "404");
        assert!(json.get("requestId").is_none());
        assert!(json.get("metadata").is_none());
    }
}
