pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod signals;
pub mod storage;

use pipeline::{PipelineLayer, PipelineLayerHandle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Initialize tracing/logging
///
/// `RUST_LOG` overrides `log_level`. `log_format` is "text" or "json".
/// With `capture_tracing`, a deferred [`PipelineLayer`] is installed as well
/// and the returned handle attaches it to a logger once the store is open.
///
/// Note: This function can only be called once per process.
pub fn init_tracing(
    log_level: &str,
    log_format: &str,
    capture_tracing: bool,
) -> Option<PipelineLayerHandle> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match log_format {
        "json" => fmt::layer().json().with_target(true).boxed(),
        _ => fmt::layer().with_target(true).boxed(),
    };

    let (pipeline_layer, handle) = if capture_tracing {
        let (layer, handle) = PipelineLayer::deferred();
        (Some(layer), Some(handle))
    } else {
        (None, None)
    };

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(pipeline_layer)
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: Failed to initialize tracing: {}", e);
        return None;
    }

    handle
}
