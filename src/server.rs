use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    config::Config,
    handlers::{self, AppState},
    metrics,
    pipeline::{BatchLogger, PipelineLayerHandle},
    signals::setup_signal_handlers,
    storage::{spawn_cleanup_task, CleanupConfig, SqliteLogStore},
};

/// Start the log service
///
/// This function:
/// 1. Initializes metrics
/// 2. Opens the store and starts the batch logger
/// 3. Starts retention cleanup and signal handlers
/// 4. Serves requests until a shutdown signal arrives
/// 5. Flushes the log buffer before returning
pub async fn start_server(
    config: Config,
    config_path: Option<PathBuf>,
    tracing_handle: Option<PipelineLayerHandle>,
) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = Arc::new(metrics::init_metrics()?);

    ensure_database_dir(&config.database.url)?;
    let store = Arc::new(
        SqliteLogStore::new(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("Failed to open log store at {}", config.database.url))?,
    );

    let logger = BatchLogger::start(store.clone(), &config.logger);
    if let Some(handle) = tracing_handle {
        if handle.attach(logger.clone()) {
            info!("Forwarding application tracing events to the log store");
        }
    }

    let cleanup_handle = if config.retention.enabled {
        info!(
            days = config.retention.days,
            cleanup_hour = config.retention.cleanup_hour,
            "Log retention enabled"
        );
        Some(spawn_cleanup_task(
            store.clone(),
            CleanupConfig {
                days: config.retention.days,
                cleanup_hour: config.retention.cleanup_hour,
                ..Default::default()
            },
        ))
    } else {
        None
    };

    // Wrap config in ArcSwap for atomic reload support
    let config_swap = Arc::new(ArcSwap::from_pointee(config.clone()));

    // SIGTERM, SIGINT for shutdown; SIGHUP for reload
    let (shutdown_tx, signal_handle) =
        setup_signal_handlers(config_swap.clone(), logger.clone(), config_path);
    let mut shutdown_rx = shutdown_tx.subscribe();

    let state = AppState {
        store,
        logger: logger.clone(),
        config: config_swap,
    };
    let app = create_router(state, metrics_handle);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting log service on {}", addr);
    info!(
        "Logger: min level {}, batch size {}, flush every {}ms",
        config.logger.min_level, config.logger.batch_size, config.logger.flush_interval_ms
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    info!(buffered = logger.buffered(), "Flushing buffered log records");
    if let Err(e) = logger.shutdown().await {
        warn!("Log buffer was not fully flushed: {}", e);
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
    }
    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState, metrics_handle: Arc<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route(
            "/api/logs",
            get(handlers::logs_api::list_logs)
                .post(handlers::logs_api::create_log)
                .delete(handlers::logs_api::purge_logs),
        )
        .route("/api/logs/stats", get(handlers::logs_api::log_stats))
        .layer(middleware::from_fn_with_state(
            state.logger.clone(),
            handlers::request_context::request_context_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .with_state(state);

    Router::new()
        .route("/metrics", get(handlers::metrics_handler::metrics))
        .with_state(metrics_handle)
        .merge(health_routes)
        .merge(api_routes)
        // Limit request body size to 1MB
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
}

/// Create the parent directory of a file-backed SQLite database
fn ensure_database_dir(database_url: &str) -> Result<()> {
    let Some(path) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }
    Ok(())
}
