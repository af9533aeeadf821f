use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics exporter
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "applog_records_enqueued_total",
        "Log records accepted into the batch buffer"
    );
    describe_counter!(
        "applog_records_persisted_total",
        "Log records written to the store"
    );
    describe_counter!(
        "applog_records_failed_total",
        "Log records that could not be written after the per-record retry"
    );
    describe_counter!(
        "applog_records_dropped_total",
        "Log records dropped before reaching the store"
    );
    describe_counter!(
        "applog_records_rejected_total",
        "Log events rejected before buffering"
    );
    describe_counter!(
        "applog_fields_omitted_total",
        "Optional fields omitted during validation"
    );
    describe_counter!(
        "applog_batch_fallbacks_total",
        "Batches that fell back to per-record inserts"
    );
    describe_histogram!(
        "applog_flush_duration_seconds",
        "Duration of a single batch flush"
    );
    describe_gauge!("applog_info", "Build information");

    gauge!("applog_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

pub fn record_enqueued() {
    counter!("applog_records_enqueued_total").increment(1);
}

pub fn record_rejected(reason: &'static str) {
    counter!("applog_records_rejected_total", "reason" => reason).increment(1);
}

pub fn record_dropped(reason: &'static str, count: u64) {
    counter!("applog_records_dropped_total", "reason" => reason).increment(count);
}

pub fn record_field_omitted(field: &'static str) {
    counter!("applog_fields_omitted_total", "field" => field).increment(1);
}

pub fn record_flush(persisted: u64, failed: u64, fell_back: bool) {
    counter!("applog_records_persisted_total").increment(persisted);
    if failed > 0 {
        counter!("applog_records_failed_total").increment(failed);
    }
    if fell_back {
        counter!("applog_batch_fallbacks_total").increment(1);
    }
}

pub fn record_flush_duration(duration: Duration) {
    histogram!("applog_flush_duration_seconds").record(duration.as_secs_f64());
}
