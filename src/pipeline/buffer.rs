//! In-memory batch buffer
//!
//! FIFO queue of validated records shared between loggers (writers) and the
//! flush task (reader). All operations take one short synchronous lock, so
//! no record is ever seen by two drains and none is lost between an `add`
//! and a later drain. Once sealed, `add` refuses new records under that same
//! lock, so nothing can land behind the final drain.

use super::record::LogRecord;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Result of [`BatchBuffer::add`]
#[derive(Debug, Default)]
pub struct AddOutcome {
    /// The buffer holds at least `batch_size` records
    pub flush_due: bool,
    /// Oldest record pushed out because the buffer was at capacity
    pub evicted: Option<LogRecord>,
}

/// Returned by [`BatchBuffer::add`] after [`BatchBuffer::seal`]
#[derive(Debug)]
pub struct BufferSealed(pub LogRecord);

#[derive(Debug, Default)]
struct Queue {
    records: VecDeque<LogRecord>,
    sealed: bool,
}

#[derive(Debug)]
pub struct BatchBuffer {
    queue: Mutex<Queue>,
    batch_size: usize,
    max_buffered: usize,
}

impl BatchBuffer {
    /// `batch_size` is the flush threshold; `max_buffered` caps memory by
    /// evicting the oldest record once reached.
    pub fn new(batch_size: usize, max_buffered: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            queue: Mutex::new(Queue {
                records: VecDeque::with_capacity(batch_size),
                sealed: false,
            }),
            batch_size,
            max_buffered: max_buffered.max(batch_size),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_buffered(&self) -> usize {
        self.max_buffered
    }

    pub fn add(&self, record: LogRecord) -> Result<AddOutcome, BufferSealed> {
        let mut queue = self.lock();
        if queue.sealed {
            return Err(BufferSealed(record));
        }
        let records = &mut queue.records;

        let evicted = if records.len() >= self.max_buffered {
            records.pop_front()
        } else {
            None
        };

        records.push_back(record);

        Ok(AddOutcome {
            flush_due: records.len() >= self.batch_size,
            evicted,
        })
    }

    /// Refuse every later `add`; records already buffered stay drainable
    pub fn seal(&self) {
        self.lock().sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Remove and return every buffered record
    pub fn drain_all(&self) -> Vec<LogRecord> {
        self.lock().records.drain(..).collect()
    }

    /// Remove and return at most `max` records from the front
    pub fn drain_up_to(&self, max: usize) -> Vec<LogRecord> {
        let mut queue = self.lock();
        let count = max.min(queue.records.len());
        queue.records.drain(..count).collect()
    }

    /// Remove one full batch if the buffer holds at least `batch_size` records
    pub fn drain_full_batch(&self) -> Option<Vec<LogRecord>> {
        let mut queue = self.lock();
        if queue.records.len() < self.batch_size {
            return None;
        }
        Some(queue.records.drain(..self.batch_size).collect())
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        // A panic while holding the lock cannot leave the deque half-updated
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::level::LogLevel;
    use std::sync::Arc;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(LogLevel::Info, message)
    }

    fn messages(records: &[LogRecord]) -> Vec<&str> {
        records.iter().map(|r| r.message.as_str()).collect()
    }

    #[test]
    fn test_flush_due_at_batch_size() {
        let buffer = BatchBuffer::new(3, 100);
        assert!(!buffer.add(record("a")).unwrap().flush_due);
        assert!(!buffer.add(record("b")).unwrap().flush_due);
        assert!(buffer.add(record("c")).unwrap().flush_due);
        assert!(buffer.add(record("d")).unwrap().flush_due);
    }

    #[test]
    fn test_drain_all_preserves_order_and_empties() {
        let buffer = BatchBuffer::new(10, 100);
        buffer.add(record("a")).unwrap();
        buffer.add(record("b")).unwrap();

        let drained = buffer.drain_all();
        assert_eq!(messages(&drained), vec!["a", "b"]);
        assert!(buffer.is_empty());
        assert!(buffer.drain_all().is_empty());
    }

    #[test]
    fn test_drain_up_to_and_full_batch() {
        let buffer = BatchBuffer::new(2, 100);
        for m in ["a", "b", "c", "d", "e"] {
            buffer.add(record(m)).unwrap();
        }

        assert_eq!(messages(&buffer.drain_full_batch().unwrap()), vec!["a", "b"]);
        assert_eq!(messages(&buffer.drain_up_to(1)), vec!["c"]);
        assert_eq!(messages(&buffer.drain_full_batch().unwrap()), vec!["d", "e"]);
        assert!(buffer.drain_full_batch().is_none());
        assert!(buffer.drain_up_to(5).is_empty());
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let buffer = BatchBuffer::new(2, 3);
        buffer.add(record("a")).unwrap();
        buffer.add(record("b")).unwrap();
        buffer.add(record("c")).unwrap();

        let outcome = buffer.add(record("d")).unwrap();
        assert_eq!(outcome.evicted.map(|r| r.message), Some("a".to_string()));
        assert_eq!(messages(&buffer.drain_all()), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_sealed_buffer_refuses_adds_but_drains() {
        let buffer = BatchBuffer::new(10, 100);
        buffer.add(record("kept")).unwrap();
        buffer.seal();

        let refused = buffer.add(record("late")).unwrap_err();
        assert_eq!(refused.0.message, "late");
        assert!(buffer.is_sealed());
        assert_eq!(messages(&buffer.drain_all()), vec!["kept"]);
    }

    #[test]
    fn test_capacity_never_below_batch_size() {
        let buffer = BatchBuffer::new(5, 1);
        assert_eq!(buffer.max_buffered(), 5);
        assert_eq!(BatchBuffer::new(0, 0).batch_size(), 1);
    }

    #[test]
    fn test_concurrent_add_and_drain_loses_nothing() {
        let buffer = Arc::new(BatchBuffer::new(16, 100_000));
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        buffer.add(record(&format!("{}-{}", w, i))).unwrap();
                    }
                })
            })
            .collect();

        let mut drained = Vec::new();
        while writers.iter().any(|h| !h.is_finished()) {
            drained.extend(buffer.drain_all());
        }
        for handle in writers {
            handle.join().unwrap();
        }
        drained.extend(buffer.drain_all());

        assert_eq!(drained.len(), 4_000);
        let mut unique: Vec<_> = drained.iter().map(|r| r.message.clone()).collect();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4_000);
    }
}
