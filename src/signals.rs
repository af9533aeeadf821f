use anyhow::Result;
use arc_swap::ArcSwap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::config::Config;
use crate::pipeline::BatchLogger;

/// Shutdown signal types
#[derive(Debug, Clone, Copy)]
pub enum ShutdownSignal {
    /// Graceful shutdown (drain connections, flush the log buffer)
    Graceful,
}

/// Setup signal handlers for the server
///
/// Returns a broadcast sender for shutdown signals and a join handle for the signal task
///
/// Handles:
/// - SIGTERM/SIGINT: Graceful shutdown
/// - SIGHUP: Configuration reload (minimum log level applies immediately)
#[cfg(unix)]
pub fn setup_signal_handlers(
    config: Arc<ArcSwap<Config>>,
    logger: BatchLogger,
    config_path: Option<PathBuf>,
) -> (
    broadcast::Sender<ShutdownSignal>,
    tokio::task::JoinHandle<()>,
) {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(async move {
        let (mut sigterm, mut sigint, mut sighup) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(term), Ok(int), Ok(hup)) => (term, int, hup),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                wait_for_ctrl_c(&tx_clone).await;
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("SIGTERM received, initiating graceful shutdown");
                    let _ = tx_clone.send(ShutdownSignal::Graceful);
                    break;
                }
                _ = sigint.recv() => {
                    info!("SIGINT received, initiating graceful shutdown");
                    let _ = tx_clone.send(ShutdownSignal::Graceful);
                    break;
                }
                _ = sighup.recv() => {
                    info!("SIGHUP received, reloading configuration");
                    if let Err(e) = reload_config(&config, &logger, config_path.as_deref()) {
                        error!("Failed to reload configuration: {}", e);
                    } else {
                        info!("Configuration reloaded successfully");
                    }
                }
            }
        }
    });

    (shutdown_tx, handle)
}

/// Windows placeholder - only Ctrl+C is supported
#[cfg(not(unix))]
pub fn setup_signal_handlers(
    _config: Arc<ArcSwap<Config>>,
    _logger: BatchLogger,
    _config_path: Option<PathBuf>,
) -> (
    broadcast::Sender<ShutdownSignal>,
    tokio::task::JoinHandle<()>,
) {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(async move {
        wait_for_ctrl_c(&tx_clone).await;
    });

    (shutdown_tx, handle)
}

async fn wait_for_ctrl_c(tx: &broadcast::Sender<ShutdownSignal>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Ctrl+C received, initiating shutdown");
            let _ = tx.send(ShutdownSignal::Graceful);
        }
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    }
}

/// Reload configuration and apply what can change at runtime
///
/// Only `logger.min_level` takes effect immediately; other logger, server
/// and database settings are stored but need a restart. If loading fails
/// the old configuration remains in place.
pub fn reload_config(
    config: &ArcSwap<Config>,
    logger: &BatchLogger,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let path = config_path.map(|p| p.to_string_lossy().into_owned());
    let new_config = crate::config::load_config(path.as_deref())?;
    let old_config = config.load();

    if new_config.logger.min_level != old_config.logger.min_level {
        info!(
            from = %old_config.logger.min_level,
            to = %new_config.logger.min_level,
            "Minimum log level changed"
        );
    }
    logger.set_min_level(new_config.logger.min_level);

    let restart_needed = LoggerSettings::from(&old_config.logger)
        != LoggerSettings::from(&new_config.logger)
        || old_config.server.port != new_config.server.port
        || old_config.server.host != new_config.server.host
        || old_config.database.url != new_config.database.url;
    if restart_needed {
        warn!("Some changed settings only take effect after a restart");
    }

    config.store(Arc::new(new_config));
    Ok(())
}

/// Logger settings fixed at startup
#[derive(PartialEq)]
struct LoggerSettings<'a> {
    batch_size: usize,
    flush_interval_ms: u64,
    max_buffered: usize,
    shutdown_timeout_ms: u64,
    environment: &'a str,
    service: &'a str,
    version: Option<&'a str>,
    capture_tracing: bool,
}

impl<'a> From<&'a crate::config::LoggerConfig> for LoggerSettings<'a> {
    fn from(cfg: &'a crate::config::LoggerConfig) -> Self {
        Self {
            batch_size: cfg.batch_size,
            flush_interval_ms: cfg.flush_interval_ms,
            max_buffered: cfg.max_buffered,
            shutdown_timeout_ms: cfg.shutdown_timeout_ms,
            environment: &cfg.environment,
            service: &cfg.service,
            version: cfg.version.as_deref(),
            capture_tracing: cfg.capture_tracing,
        }
    }
}
