//! Side channel for the pipeline's own failures
//!
//! Everything here goes straight to the console subscriber under a dedicated
//! target. The tracing bridge refuses to forward that target, so a store
//! outage can never feed records about itself back into the buffer.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tracing target for pipeline diagnostics
pub const DIAGNOSTICS_TARGET: &str = "applog::diagnostics";

/// Field omitted by the validator
pub fn field_omitted(field: &'static str, reason: &str) {
    tracing::debug!(target: DIAGNOSTICS_TARGET, field, reason, "Omitting log field");
    crate::metrics::record_field_omitted(field);
}

/// Metadata dropped because it could not be serialized
pub fn metadata_dropped(error: &str) {
    tracing::warn!(target: DIAGNOSTICS_TARGET, error, "Dropping unserializable log metadata");
    crate::metrics::record_field_omitted("metadata");
}

/// Event rejected before reaching the buffer
pub fn event_rejected(reason: &str) {
    tracing::warn!(target: DIAGNOSTICS_TARGET, reason, "Log event rejected");
}

/// Oldest buffered record evicted by the overflow policy
pub fn record_evicted(buffered: usize) {
    tracing::warn!(
        target: DIAGNOSTICS_TARGET,
        buffered,
        "Log buffer full, evicted oldest record"
    );
}

pub fn bulk_insert_failed(count: usize, error: &str) {
    tracing::warn!(
        target: DIAGNOSTICS_TARGET,
        count,
        error,
        "Bulk log insert failed, retrying records individually"
    );
}

pub fn record_insert_failed(index: usize, error: &str) {
    tracing::error!(
        target: DIAGNOSTICS_TARGET,
        index,
        error,
        "Log record could not be persisted"
    );
}

pub fn batch_failed(batch_size: usize, persisted: usize, failed: usize, error: &str) {
    tracing::error!(
        target: DIAGNOSTICS_TARGET,
        batch_size,
        persisted,
        failed,
        error,
        "Log batch flush failed"
    );
}

pub fn batch_flushed(count: usize, duration_ms: u128) {
    tracing::debug!(target: DIAGNOSTICS_TARGET, count, duration_ms, "Flushed log batch");
}

pub fn flush_panicked(panic: &str, lost: usize) {
    tracing::error!(target: DIAGNOSTICS_TARGET, panic, lost, "Log flush cycle panicked, batch lost");
}

/// Text of a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub fn shutdown_failed(error: &str) {
    // stderr as well: at shutdown the console subscriber may already be gone
    eprintln!("applog: final log flush failed: {}", error);
    tracing::error!(target: DIAGNOSTICS_TARGET, error, "Final log flush failed");
}

/// Process-local pipeline counters
///
/// Make sustained storage outages observable without surfacing anything to
/// end users. Every increment is mirrored to the `metrics` recorder.
#[derive(Debug, Default)]
pub struct PipelineStats {
    enqueued: AtomicU64,
    filtered: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
    flushes: AtomicU64,
    fallbacks: AtomicU64,
    dropped_after_shutdown: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub filtered: u64,
    pub rejected: u64,
    pub evicted: u64,
    pub persisted: u64,
    pub failed: u64,
    pub flushes: u64,
    pub fallbacks: u64,
    pub dropped_after_shutdown: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_enqueued();
    }

    pub fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_rejected("validation");
    }

    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_dropped("evicted", 1);
    }

    pub fn record_dropped_after_shutdown(&self) {
        self.dropped_after_shutdown.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_rejected("shutdown");
    }

    pub fn record_flush(&self, persisted: usize, failed: usize, fell_back: bool) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.persisted.fetch_add(persisted as u64, Ordering::Relaxed);
        self.failed.fetch_add(failed as u64, Ordering::Relaxed);
        if fell_back {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        crate::metrics::record_flush(persisted as u64, failed as u64, fell_back);
    }

    /// Records taken out of the buffer by a cycle that never finished
    pub fn record_lost(&self, count: usize) {
        self.failed.fetch_add(count as u64, Ordering::Relaxed);
        crate::metrics::record_flush(0, count as u64, false);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            dropped_after_shutdown: self.dropped_after_shutdown.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = PipelineStats::new();
        stats.record_enqueued();
        stats.record_enqueued();
        stats.record_flush(1, 1, true);
        stats.record_flush(3, 0, false);

        let snap = stats.snapshot();
        assert_eq!(snap.enqueued, 2);
        assert_eq!(snap.persisted, 4);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.flushes, 2);
        assert_eq!(snap.fallbacks, 1);
    }

    #[test]
    fn test_panic_message_downcasts_payload() {
        let payload = std::panic::catch_unwind(|| panic!("store exploded")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "store exploded");

        let payload = std::panic::catch_unwind(|| panic!("{} rows", 3)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "3 rows");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_lost_records_count_as_failed() {
        let stats = PipelineStats::new();
        stats.record_lost(4);

        let snap = stats.snapshot();
        assert_eq!(snap.failed, 4);
        assert_eq!(snap.flushes, 0);
    }
}
