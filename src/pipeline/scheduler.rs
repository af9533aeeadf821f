//! Flush scheduling
//!
//! A single background task owns every flush cycle of one logger, so two
//! flushes never run at the same time:
//!
//! - **size trigger**: the logger pokes a `Notify` when the buffer reaches
//!   `batch_size`; repeated pokes coalesce into one wake-up. Only full
//!   batches are flushed, the remainder waits for the timer.
//! - **timer**: every `flush_interval`, everything buffered is flushed in
//!   `batch_size` chunks.
//! - **shutdown**: `close()` seals the buffer, stops the loop and runs one
//!   final drain, bounded by `shutdown_timeout`.
//!
//! Out-of-band `flush_now()` calls share the same gate as the task.

use super::buffer::BatchBuffer;
use super::diagnostics::{self, DIAGNOSTICS_TARGET};
use super::error::ShutdownFlushError;
use super::executor::{FlushExecutor, FlushOutcome};
use super::record::LogRecord;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Drains the buffer into the executor under a shared gate
struct FlushCycle {
    buffer: Arc<BatchBuffer>,
    executor: Arc<FlushExecutor>,
    gate: tokio::sync::Mutex<()>,
    /// Size of the batch currently inside the executor
    in_flight: AtomicUsize,
}

impl FlushCycle {
    /// Flush complete batches only
    async fn flush_full_batches(&self) -> FlushOutcome {
        let _gate = self.gate.lock().await;
        let mut total = FlushOutcome::default();
        while let Some(batch) = self.buffer.drain_full_batch() {
            total += self.flush_batch(batch).await;
        }
        total
    }

    /// Flush everything buffered when the cycle starts, in batch-size chunks
    async fn flush_all(&self) -> FlushOutcome {
        let _gate = self.gate.lock().await;
        let mut remaining = self.buffer.len();
        let mut total = FlushOutcome::default();

        while remaining > 0 {
            let batch = self
                .buffer
                .drain_up_to(self.buffer.batch_size().min(remaining));
            if batch.is_empty() {
                break;
            }
            remaining = remaining.saturating_sub(batch.len());
            total += self.flush_batch(batch).await;
        }
        total
    }

    async fn flush_batch(&self, batch: Vec<LogRecord>) -> FlushOutcome {
        self.in_flight.store(batch.len(), Ordering::Release);
        let outcome = self.executor.flush(batch).await;
        self.in_flight.store(0, Ordering::Release);
        outcome
    }

    /// Run one cycle; a panic loses the batch in flight but not the loop
    ///
    /// The lost batch is counted as failed.
    async fn guarded<F>(&self, cycle: F) -> FlushOutcome
    where
        F: Future<Output = FlushOutcome>,
    {
        match AssertUnwindSafe(cycle).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let lost = self.in_flight.swap(0, Ordering::AcqRel);
                self.executor.stats().record_lost(lost);
                diagnostics::flush_panicked(&diagnostics::panic_message(panic.as_ref()), lost);
                FlushOutcome {
                    attempted: lost,
                    failed: lost,
                    ..Default::default()
                }
            }
        }
    }
}

pub struct FlushScheduler {
    cycle: Arc<FlushCycle>,
    trigger: Arc<Notify>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    shutdown_timeout: Duration,
}

impl FlushScheduler {
    /// Spawn the flush task; must be called from within a tokio runtime
    pub fn start(
        buffer: Arc<BatchBuffer>,
        executor: Arc<FlushExecutor>,
        flush_interval: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        let cycle = Arc::new(FlushCycle {
            buffer,
            executor,
            gate: tokio::sync::Mutex::new(()),
            in_flight: AtomicUsize::new(0),
        });
        let trigger = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(flush_loop(
            cycle.clone(),
            trigger.clone(),
            shutdown_rx,
            flush_interval.max(Duration::from_millis(1)),
        ));

        Self {
            cycle,
            trigger,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            task: tokio::sync::Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
            shutdown_timeout,
        }
    }

    /// Ask the task to flush full batches as soon as possible
    pub fn request_flush(&self) {
        self.trigger.notify_one();
    }

    /// Flush everything buffered right now, serialized with the task
    pub async fn flush_now(&self) -> FlushOutcome {
        self.cycle.guarded(self.cycle.flush_all()).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop the timer and run the final flush
    ///
    /// Returns once the final flush finished or `shutdown_timeout` elapsed.
    /// Later calls are no-ops.
    pub async fn close(&self) -> Result<(), ShutdownFlushError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Nothing may land in the buffer after the final drain
        self.cycle.buffer.seal();

        let sender = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }

        let Some(handle) = self.task.lock().await.take() else {
            return Ok(());
        };

        let result = match tokio::time::timeout(self.shutdown_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ShutdownFlushError::TaskFailed(e.to_string())),
            Err(_) => Err(ShutdownFlushError::Timeout(self.shutdown_timeout)),
        };

        if let Err(e) = &result {
            diagnostics::shutdown_failed(&e.to_string());
        }
        result
    }
}

async fn flush_loop(
    cycle: Arc<FlushCycle>,
    trigger: Arc<Notify>,
    mut shutdown_rx: oneshot::Receiver<()>,
    flush_interval: Duration,
) {
    // First tick one full period after start, not immediately
    let mut ticker = tokio::time::interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // Explicit close, or the scheduler was dropped
            _ = &mut shutdown_rx => break,

            _ = trigger.notified() => {
                cycle.guarded(cycle.flush_full_batches()).await;
            }

            _ = ticker.tick() => {
                cycle.guarded(cycle.flush_all()).await;
            }
        }
    }

    let outcome = cycle.guarded(cycle.flush_all()).await;
    tracing::debug!(
        target: DIAGNOSTICS_TARGET,
        persisted = outcome.persisted,
        failed = outcome.failed,
        "Final log flush completed"
    );
}
