mod common;

use applog::pipeline::{BatchLogger, LogLevel, RawEvent, RecordDefaults, RecordValidator};
use common::{logger_config, settle, RecordingStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const USER_ID: &str = "0b6a1f0e-8d3c-4b7a-9a55-3f2e1c4d5b6a";

#[tokio::test(start_paused = true)]
async fn test_missing_level_or_message_never_reaches_store() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(1));

    logger.submit(RawEvent {
        level: None,
        message: Some("no level".to_string()),
        timestamp: None,
        metadata: None,
    });
    logger.submit(RawEvent {
        level: Some(LogLevel::Info),
        message: None,
        timestamp: None,
        metadata: None,
    });

    assert_eq!(logger.buffered(), 0);
    logger.shutdown().await.unwrap();

    assert!(store.calls().is_empty());
    assert_eq!(logger.stats().rejected, 2);
}

#[test]
fn test_malformed_request_id_is_dropped_not_fatal() {
    let validator = RecordValidator::new(RecordDefaults::default());
    let event = RawEvent::new(LogLevel::Info, "checkout").with_metadata(
        json!({ "requestId": "not-a-uuid", "cart": 3 })
            .as_object()
            .cloned()
            .unwrap(),
    );

    let record = validator.validate(event).unwrap();
    assert_eq!(record.request_id, None);
    assert_eq!(record.metadata.unwrap()["cart"], 3);
}

#[tokio::test(start_paused = true)]
async fn test_full_batch_flushes_before_timer() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    for i in 0..10 {
        logger.info(format!("event {}", i), None);
    }
    settle().await;

    assert_eq!(store.call_sizes(), vec![10]);
    assert_eq!(logger.buffered(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timer_flushes_single_record() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    logger.info("lonely", None);
    settle().await;
    assert!(store.calls().is_empty());

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    settle().await;

    assert_eq!(store.call_sizes(), vec![1]);
    assert_eq!(store.messages(), vec!["lonely"]);
}

#[tokio::test(start_paused = true)]
async fn test_partial_failure_is_isolated() {
    let store = Arc::new(RecordingStore::failing_bulk());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));
    let mut failures = logger.subscribe_failures();

    for i in 0..9 {
        logger.info(format!("ok {}", i), None);
    }
    logger.info("poison row", None);
    settle().await;

    assert_eq!(store.rows().len(), 9);
    let failure = failures.try_recv().unwrap();
    assert_eq!(failure.batch_size, 10);
    assert_eq!(failure.persisted, 9);
    assert_eq!(failure.failed, 1);

    let stats = logger.stats();
    assert_eq!(stats.persisted, 9);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_before_timer() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    logger.warn("first", None);
    logger.error("second", None);
    logger.info("third", None);

    logger.shutdown().await.unwrap();

    assert_eq!(store.messages(), vec!["first", "second", "third"]);
}

#[tokio::test(start_paused = true)]
async fn test_double_shutdown_inserts_once() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    logger.info("only once", None);
    logger.shutdown().await.unwrap();
    logger.shutdown().await.unwrap();

    assert_eq!(store.calls().len(), 1);
    assert_eq!(store.rows().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_records_keep_fifo_order() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    logger.info("A", None);
    logger.info("B", None);
    logger.flush().await;

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    let messages: Vec<&str> = calls[0].iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, vec!["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn test_user_signup_with_batch_size_one() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(1));

    logger.info("user signed up", Some(json!({ "userId": USER_ID })));
    settle().await;

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 1);

    let record = &calls[0][0];
    assert_eq!(record.level, LogLevel::Info);
    assert_eq!(record.message, "user signed up");
    assert_eq!(record.user_id.map(|u| u.to_string()).as_deref(), Some(USER_ID));
}

#[tokio::test(start_paused = true)]
async fn test_long_stack_is_kept_whole() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));
    let stack = "at frame\n".repeat(556);
    assert!(stack.len() > 5_000);

    logger.error("db timeout", Some(json!({ "stack": stack })));
    logger.shutdown().await.unwrap();

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].stack.as_deref(), Some(stack.as_str()));
}

#[tokio::test(start_paused = true)]
async fn test_twenty_five_records_in_batches_of_ten() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    for i in 0..25 {
        logger.info(format!("event {}", i), None);
    }
    settle().await;

    assert_eq!(store.call_sizes(), vec![10, 10]);
    assert_eq!(logger.buffered(), 5);

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    settle().await;

    assert_eq!(store.call_sizes(), vec![10, 10, 5]);
    let expected: Vec<String> = (0..25).map(|i| format!("event {}", i)).collect();
    assert_eq!(store.messages(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_remainder_flushed_on_shutdown() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    for i in 0..25 {
        logger.info(format!("event {}", i), None);
    }
    logger.shutdown().await.unwrap();

    assert_eq!(store.rows().len(), 25);
    assert_eq!(store.call_sizes().iter().sum::<usize>(), 25);
}

#[tokio::test(start_paused = true)]
async fn test_fourth_record_of_five_fails() {
    let store = Arc::new(RecordingStore::failing_bulk());
    let logger = BatchLogger::start(store.clone(), &logger_config(5));
    let mut failures = logger.subscribe_failures();

    logger.info("record 1", None);
    logger.info("record 2", None);
    logger.info("record 3", None);
    logger.info("record 4 poison", None);
    logger.info("record 5", None);
    settle().await;

    assert_eq!(
        store.messages(),
        vec!["record 1", "record 2", "record 3", "record 5"]
    );
    // One bulk attempt, then five single-record retries
    assert_eq!(store.call_sizes(), vec![5, 1, 1, 1, 1, 1]);

    let failure = failures.try_recv().unwrap();
    assert_eq!(failure.failed, 1);
    assert!(failures.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_empty_message_leaves_buffer_empty() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    logger.log(LogLevel::Warn, "", None);

    assert_eq!(logger.buffered(), 0);
    assert_eq!(logger.stats().rejected, 1);
    assert_eq!(logger.stats().enqueued, 0);
}

#[tokio::test(start_paused = true)]
async fn test_buffer_evicts_oldest_when_full() {
    let store = Arc::new(RecordingStore::default());
    let config = applog::config::LoggerConfig {
        batch_size: 10,
        max_buffered: 10,
        ..Default::default()
    };
    let logger = BatchLogger::start(store.clone(), &config);

    // The size trigger is asynchronous, so the buffer can overrun before it runs
    for i in 0..12 {
        logger.info(format!("event {}", i), None);
    }
    logger.shutdown().await.unwrap();

    let stats = logger.stats();
    assert_eq!(stats.enqueued, 12);
    assert_eq!(stats.persisted + stats.evicted, 12);
    assert_eq!(store.messages().last().map(String::as_str), Some("event 11"));
}

#[tokio::test(start_paused = true)]
async fn test_logging_after_shutdown_is_counted() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    logger.shutdown().await.unwrap();
    logger.info("too late", None);

    assert_eq!(logger.buffered(), 0);
    assert_eq!(logger.stats().dropped_after_shutdown, 1);
    assert!(store.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_min_level_changes_at_runtime() {
    let store = Arc::new(RecordingStore::default());
    let logger = BatchLogger::start(store.clone(), &logger_config(10));

    logger.debug("hidden", None);
    logger.set_min_level(LogLevel::Debug);
    logger.debug("visible", None);
    logger.shutdown().await.unwrap();

    assert_eq!(store.messages(), vec!["visible"]);
    assert_eq!(logger.stats().filtered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_logging_during_shutdown_loses_nothing() {
    const WRITERS: usize = 4;
    const PER_WRITER: usize = 10_000;

    let store = Arc::new(RecordingStore::default());
    let config = applog::config::LoggerConfig {
        batch_size: 10,
        max_buffered: 1_000_000,
        shutdown_timeout_ms: 30_000,
        ..logger_config(10)
    };
    let logger = BatchLogger::start(store.clone(), &config);

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let logger = logger.clone();
            std::thread::spawn(move || {
                for i in 0..PER_WRITER {
                    logger.info(format!("writer {} event {}", w, i), None);
                }
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(2)).await;
    logger.shutdown().await.unwrap();
    for writer in writers {
        writer.join().unwrap();
    }

    let stats = logger.stats();
    assert_eq!(logger.buffered(), 0);
    assert_eq!(stats.evicted, 0);
    assert_eq!(stats.enqueued, stats.persisted + stats.failed);
    assert_eq!(
        stats.enqueued + stats.dropped_after_shutdown,
        (WRITERS * PER_WRITER) as u64
    );
    assert_eq!(store.rows().len() as u64, stats.persisted);
}
