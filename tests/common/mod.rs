#![allow(dead_code)]

use applog::config::LoggerConfig;
use applog::pipeline::{LogRecord, StorageError};
use applog::storage::LogStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Store that records every `insert_many` call
///
/// With `fail_bulk` set, multi-record calls fail. Records whose message
/// contains `poison` always fail, which is how a malformed row is simulated.
#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<Vec<LogRecord>>>,
    rows: Mutex<Vec<LogRecord>>,
    fail_bulk: AtomicBool,
}

impl RecordingStore {
    pub fn failing_bulk() -> Self {
        let store = Self::default();
        store.fail_bulk.store(true, Ordering::SeqCst);
        store
    }

    /// Every call, successful or not, in call order
    pub fn calls(&self) -> Vec<Vec<LogRecord>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(Vec::len).collect()
    }

    /// Records that were persisted
    pub fn rows(&self) -> Vec<LogRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.rows().into_iter().map(|r| r.message).collect()
    }
}

#[async_trait]
impl LogStore for RecordingStore {
    async fn insert_many(&self, records: &[LogRecord]) -> Result<(), StorageError> {
        self.calls.lock().unwrap().push(records.to_vec());

        if self.fail_bulk.load(Ordering::SeqCst) && records.len() > 1 {
            return Err(StorageError::Unavailable("connection reset".to_string()));
        }
        if records.iter().any(|r| r.message.contains("poison")) {
            return Err(StorageError::Constraint(
                "CHECK constraint failed: message".to_string(),
            ));
        }

        self.rows.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

/// Logger config with a long timer so only explicit triggers flush
pub fn logger_config(batch_size: usize) -> LoggerConfig {
    LoggerConfig {
        batch_size,
        flush_interval_ms: 5_000,
        ..Default::default()
    }
}

/// Let the flush task run without moving the clock much
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
