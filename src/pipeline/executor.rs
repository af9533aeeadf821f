//! Flush executor
//!
//! Writes one batch to the store. A failed bulk insert falls back to
//! inserting every record on its own so that a single bad row cannot sink
//! the rest of the batch. Nothing here returns an error: failures end up on
//! the diagnostics side channel, in the stats, and as one [`FlushFailure`]
//! event per failed batch.

use super::diagnostics::{self, PipelineStats};
use super::record::LogRecord;
use super::validator::is_storable_timestamp;
use crate::storage::LogStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// Aggregate event emitted after a batch needed the per-record fallback
#[derive(Debug, Clone, Serialize)]
pub struct FlushFailure {
    pub batch_size: usize,
    pub persisted: usize,
    pub failed: usize,
    /// Error from the bulk insert
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Result of a single [`FlushExecutor::flush`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub attempted: usize,
    pub persisted: usize,
    pub failed: usize,
    pub fell_back: bool,
}

impl std::ops::AddAssign for FlushOutcome {
    fn add_assign(&mut self, other: Self) {
        self.attempted += other.attempted;
        self.persisted += other.persisted;
        self.failed += other.failed;
        self.fell_back |= other.fell_back;
    }
}

pub struct FlushExecutor {
    store: Arc<dyn LogStore>,
    stats: Arc<PipelineStats>,
    failures: broadcast::Sender<FlushFailure>,
    report_success: bool,
}

impl FlushExecutor {
    /// `report_success` enables a debug diagnostic per successful batch
    pub fn new(store: Arc<dyn LogStore>, stats: Arc<PipelineStats>, report_success: bool) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            store,
            stats,
            failures,
            report_success,
        }
    }

    /// Receive an event for every batch that needed the per-record fallback
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlushFailure> {
        self.failures.subscribe()
    }

    pub async fn flush(&self, records: Vec<LogRecord>) -> FlushOutcome {
        if records.is_empty() {
            return FlushOutcome::default();
        }

        let attempted = records.len();
        let start = Instant::now();
        let (records, invalid) = repair(records);

        let mut outcome = FlushOutcome {
            attempted,
            persisted: 0,
            failed: invalid,
            fell_back: false,
        };

        if !records.is_empty() {
            match self.store.insert_many(&records).await {
                Ok(()) => {
                    outcome.persisted = records.len();
                    if self.report_success {
                        diagnostics::batch_flushed(records.len(), start.elapsed().as_millis());
                    }
                }
                Err(e) => {
                    let error = e.to_string();
                    diagnostics::bulk_insert_failed(records.len(), &error);
                    outcome.fell_back = true;

                    for (index, record) in records.iter().enumerate() {
                        match self.store.insert_many(std::slice::from_ref(record)).await {
                            Ok(()) => outcome.persisted += 1,
                            Err(e) => {
                                diagnostics::record_insert_failed(index, &e.to_string());
                                outcome.failed += 1;
                            }
                        }
                    }

                    diagnostics::batch_failed(attempted, outcome.persisted, outcome.failed, &error);
                    // No subscribers is fine
                    let _ = self.failures.send(FlushFailure {
                        batch_size: attempted,
                        persisted: outcome.persisted,
                        failed: outcome.failed,
                        error,
                        at: Utc::now(),
                    });
                }
            }
        }

        crate::metrics::record_flush_duration(start.elapsed());
        self.stats
            .record_flush(outcome.persisted, outcome.failed, outcome.fell_back);

        outcome
    }
}

/// Re-check structural invariants before the insert
///
/// Records without a message are counted as failed and skipped; timestamps
/// the store cannot hold are replaced with the current instant.
fn repair(records: Vec<LogRecord>) -> (Vec<LogRecord>, usize) {
    let mut invalid = 0;
    let mut valid = Vec::with_capacity(records.len());

    for mut record in records {
        if record.message.trim().is_empty() {
            diagnostics::event_rejected("buffered record has an empty message");
            invalid += 1;
            continue;
        }
        if !is_storable_timestamp(&record.timestamp) {
            diagnostics::field_omitted("timestamp", "unstorable timestamp replaced with now");
            record.timestamp = Utc::now();
        }
        valid.push(record);
    }

    (valid, invalid)
}
