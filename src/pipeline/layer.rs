//! Tracing bridge
//!
//! Forwards application `tracing` events into a [`BatchLogger`], so code that
//! already uses `tracing::info!` ends up in the store without touching the
//! logger directly.
//!
//! The global subscriber is installed before the store is opened, so the
//! layer can be created empty and attached to a logger later.

use super::level::LogLevel;
use super::logger::BatchLogger;
use super::record::{Metadata, RawEvent};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

/// Targets never forwarded; the pipeline must not log about itself into itself
const SKIPPED_TARGET_PREFIXES: &[&str] = &[
    "applog::diagnostics",
    "applog::pipeline",
    "applog::storage",
    "sqlx",
];

pub struct PipelineLayer {
    logger: Arc<OnceLock<BatchLogger>>,
}

/// Attaches a logger to a layer created with [`PipelineLayer::deferred`]
#[derive(Clone)]
pub struct PipelineLayerHandle {
    logger: Arc<OnceLock<BatchLogger>>,
}

impl PipelineLayer {
    pub fn new(logger: BatchLogger) -> Self {
        Self {
            logger: Arc::new(OnceLock::from(logger)),
        }
    }

    /// Layer that drops events until a logger is attached
    pub fn deferred() -> (Self, PipelineLayerHandle) {
        let logger = Arc::new(OnceLock::new());
        (
            Self {
                logger: logger.clone(),
            },
            PipelineLayerHandle { logger },
        )
    }
}

impl PipelineLayerHandle {
    /// Returns false if a logger was already attached
    pub fn attach(&self, logger: BatchLogger) -> bool {
        self.logger.set(logger).is_ok()
    }
}

fn level_of(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        Level::DEBUG => LogLevel::Debug,
        Level::TRACE => LogLevel::Silly,
    }
}

fn is_skipped(target: &str) -> bool {
    SKIPPED_TARGET_PREFIXES
        .iter()
        .any(|prefix| target.starts_with(prefix))
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Metadata,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        // Field names follow Rust style; the lifted columns use camelCase
        let name = match field.name() {
            "request_id" => "requestId",
            "user_id" => "userId",
            "session_id" => "sessionId",
            "status_code" => "statusCode",
            "error_code" => "errorCode",
            other => other,
        };
        self.fields.insert(name.to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.insert(field, Value::String(text.trim_matches('"').to_string()));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }
}

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if is_skipped(target) {
            return;
        }
        let Some(logger) = self.logger.get() else {
            return;
        };

        let level = level_of(metadata.level());
        if !logger.is_enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let Some(message) = visitor.message else {
            return;
        };

        let mut fields = visitor.fields;
        fields.insert("target".to_string(), Value::String(target.to_string()));

        logger.submit(RawEvent::new(level, message).with_metadata(fields));
    }
}
