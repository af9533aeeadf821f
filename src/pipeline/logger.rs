//! Emission façade
//!
//! `BatchLogger` is the level-based API handed to application code. It is a
//! cheap handle (`Clone`) around one buffer, one flush task and one
//! executor. Nothing here ever returns an error or panics into the caller:
//! filtered events are counted, rejected events go to the diagnostics
//! target.
//!
//! ```ignore
//! let logger = BatchLogger::start(store, &config.logger);
//! logger.info("user signed up", Some(json!({ "userId": user_id })));
//! logger.shutdown().await?;
//! ```

use super::buffer::BatchBuffer;
use super::diagnostics::{self, PipelineStats, StatsSnapshot};
use super::error::ShutdownFlushError;
use super::executor::{FlushExecutor, FlushFailure, FlushOutcome};
use super::level::LogLevel;
use super::record::{Metadata, RawEvent, RawMetadata};
use super::scheduler::FlushScheduler;
use super::validator::{RecordValidator, DEFAULT_ENVIRONMENT};
use crate::config::LoggerConfig;
use crate::storage::LogStore;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

struct LoggerInner {
    validator: RecordValidator,
    buffer: Arc<BatchBuffer>,
    executor: Arc<FlushExecutor>,
    scheduler: FlushScheduler,
    stats: Arc<PipelineStats>,
    min_level: AtomicU8,
}

#[derive(Clone)]
pub struct BatchLogger {
    inner: Arc<LoggerInner>,
}

impl BatchLogger {
    /// Build the pipeline and spawn its flush task
    ///
    /// Must be called from within a tokio runtime. Dropping the last handle
    /// stops the task after one final flush; call [`BatchLogger::shutdown`]
    /// to wait for it.
    pub fn start(store: Arc<dyn LogStore>, config: &LoggerConfig) -> Self {
        let stats = Arc::new(PipelineStats::new());
        let buffer = Arc::new(BatchBuffer::new(config.batch_size, config.max_buffered));
        let report_success = config.environment == DEFAULT_ENVIRONMENT;
        let executor = Arc::new(FlushExecutor::new(store, stats.clone(), report_success));
        let scheduler = FlushScheduler::start(
            buffer.clone(),
            executor.clone(),
            config.flush_interval(),
            config.shutdown_timeout(),
        );

        tracing::debug!(
            batch_size = buffer.batch_size(),
            max_buffered = buffer.max_buffered(),
            flush_interval_ms = config.flush_interval_ms,
            min_level = %config.min_level,
            "Batch logger started"
        );

        Self {
            inner: Arc::new(LoggerInner {
                validator: RecordValidator::new(config.record_defaults()),
                buffer,
                executor,
                scheduler,
                stats,
                min_level: AtomicU8::new(config.min_level.rank()),
            }),
        }
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_rank(self.inner.min_level.load(Ordering::Relaxed)).unwrap_or(LogLevel::Info)
    }

    /// Change the minimum level at runtime
    pub fn set_min_level(&self, level: LogLevel) {
        self.inner.min_level.store(level.rank(), Ordering::Relaxed);
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level.is_enabled_for(self.min_level())
    }

    pub fn validator(&self) -> &RecordValidator {
        &self.inner.validator
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>, metadata: Option<Value>) {
        if !self.is_enabled(level) {
            self.inner.stats.record_filtered();
            return;
        }

        let mut event = RawEvent::new(level, message);
        event.metadata = metadata.map(RawMetadata::Structured);
        self.enqueue(event);
    }

    pub fn error(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Error, message, metadata);
    }

    pub fn warn(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Warn, message, metadata);
    }

    pub fn info(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Info, message, metadata);
    }

    pub fn verbose(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Verbose, message, metadata);
    }

    pub fn debug(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Debug, message, metadata);
    }

    pub fn silly(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Silly, message, metadata);
    }

    /// Log an HTTP exchange; the level follows the status code
    pub fn http(&self, status_code: u16, response_time_ms: u64, metadata: Option<Value>) {
        let message = format!("HTTP {} - {}ms", status_code, response_time_ms);
        self.log(
            LogLevel::for_status(status_code),
            message,
            Some(with_http_fields(metadata, status_code, response_time_ms)),
        );
    }

    /// Submit a pre-built event; level filtering still applies
    pub fn submit(&self, event: RawEvent) {
        if let Some(level) = event.level {
            if !self.is_enabled(level) {
                self.inner.stats.record_filtered();
                return;
            }
        }
        self.enqueue(event);
    }

    /// Flush everything buffered now
    pub async fn flush(&self) -> FlushOutcome {
        self.inner.scheduler.flush_now().await
    }

    /// Stop the flush task after a final flush
    ///
    /// Safe to call more than once; events logged afterwards are rejected.
    pub async fn shutdown(&self) -> Result<(), ShutdownFlushError> {
        self.inner.scheduler.close().await
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.scheduler.is_closed()
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<FlushFailure> {
        self.inner.executor.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Records waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.inner.buffer.len()
    }

    pub fn for_request(&self, context: RequestContext) -> RequestLogger {
        RequestLogger {
            logger: self.clone(),
            context: Arc::new(context),
        }
    }

    fn enqueue(&self, event: RawEvent) {
        if self.is_shut_down() {
            self.inner.stats.record_dropped_after_shutdown();
            diagnostics::event_rejected("logger is shut down");
            return;
        }

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let inner = &self.inner;
            match inner.validator.validate(event) {
                Ok(record) => match inner.buffer.add(record) {
                    Ok(outcome) => {
                        inner.stats.record_enqueued();
                        if outcome.evicted.is_some() {
                            inner.stats.record_evicted();
                            diagnostics::record_evicted(inner.buffer.max_buffered());
                        }
                        if outcome.flush_due {
                            inner.scheduler.request_flush();
                        }
                    }
                    // Lost the race with shutdown; the final drain has the rest
                    Err(_) => {
                        inner.stats.record_dropped_after_shutdown();
                        diagnostics::event_rejected("logger is shut down");
                    }
                },
                Err(e) => {
                    inner.stats.record_rejected();
                    diagnostics::event_rejected(&e.to_string());
                }
            }
        }));

        if let Err(panic) = result {
            self.inner.stats.record_rejected();
            diagnostics::event_rejected(&format!(
                "panic while logging: {}",
                diagnostics::panic_message(panic.as_ref())
            ));
        }
    }
}

/// Ambient context of one HTTP request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<Uuid>,
    /// Unvalidated; dropped by the validator unless it is a UUID
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub method: Option<String>,
    pub url: Option<String>,
}

impl RequestContext {
    fn to_metadata(&self) -> Metadata {
        let mut map = Metadata::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::String(value));
            }
        };
        put("requestId", self.request_id.map(|id| id.to_string()));
        put("userId", self.user_id.clone());
        put("sessionId", self.session_id.clone());
        put("ip", self.ip.clone());
        put("userAgent", self.user_agent.clone());
        put("method", self.method.clone());
        put("url", self.url.clone());
        map
    }
}

/// Logger bound to one request's context
///
/// Every record carries the bound context; keys given at the call site win.
#[derive(Clone)]
pub struct RequestLogger {
    logger: BatchLogger,
    context: Arc<RequestContext>,
}

impl RequestLogger {
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn logger(&self) -> &BatchLogger {
        &self.logger
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>, metadata: Option<Value>) {
        // Skip the merge for filtered levels
        if !self.logger.is_enabled(level) {
            self.logger.inner.stats.record_filtered();
            return;
        }
        let merged = merge_context(metadata, self.context.to_metadata());
        self.logger.log(level, message, Some(merged));
    }

    pub fn error(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Error, message, metadata);
    }

    pub fn warn(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Warn, message, metadata);
    }

    pub fn info(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Info, message, metadata);
    }

    pub fn verbose(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Verbose, message, metadata);
    }

    pub fn debug(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Debug, message, metadata);
    }

    pub fn silly(&self, message: impl Into<String>, metadata: Option<Value>) {
        self.log(LogLevel::Silly, message, metadata);
    }

    pub fn http(&self, status_code: u16, response_time_ms: u64, metadata: Option<Value>) {
        let message = match (&self.context.method, &self.context.url) {
            (Some(method), Some(url)) => {
                format!("{} {} {} - {}ms", method, url, status_code, response_time_ms)
            }
            _ => format!("HTTP {} - {}ms", status_code, response_time_ms),
        };
        self.log(
            LogLevel::for_status(status_code),
            message,
            Some(with_http_fields(metadata, status_code, response_time_ms)),
        );
    }
}

fn into_map(metadata: Option<Value>) -> Metadata {
    match metadata {
        None | Some(Value::Null) => Metadata::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = Metadata::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn merge_context(metadata: Option<Value>, context: Metadata) -> Value {
    let mut map = into_map(metadata);
    for (key, value) in context {
        map.entry(key).or_insert(value);
    }
    Value::Object(map)
}

fn with_http_fields(metadata: Option<Value>, status_code: u16, response_time_ms: u64) -> Value {
    let mut map = into_map(metadata);
    map.insert("statusCode".to_string(), Value::from(status_code));
    map.insert("responseTime".to_string(), Value::from(response_time_ms));
    Value::Object(map)
}
