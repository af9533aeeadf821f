use anyhow::Result;
use applog::{config, init_tracing, server};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

/// Execute the start command
///
/// Loads configuration, initializes tracing from it and runs the server
/// until a shutdown signal arrives.
pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "Starting log service...".green());

    let path = config_path.as_deref().and_then(|p| p.to_str());
    let cfg = config::load_config(path)?;

    let tracing_handle = init_tracing(
        &cfg.server.log_level,
        &cfg.server.log_format,
        cfg.logger.capture_tracing,
    );

    info!(
        environment = %cfg.logger.environment,
        service = %cfg.logger.service,
        "Starting applog"
    );

    // Blocks until shutdown
    server::start_server(cfg, config_path, tracing_handle).await?;

    Ok(())
}
