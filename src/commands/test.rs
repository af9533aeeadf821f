use anyhow::Result;
use applog::config;
use colored::Colorize;
use tracing::info;

/// Execute the test command
///
/// This validates the configuration without starting the server
pub fn execute(config_path: Option<&str>) -> Result<()> {
    println!("{}", "Testing configuration...".yellow());
    info!("Loading and validating configuration");

    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration test successful".green());
    println!();

    println!("{}", "Configuration Summary:".bold());
    println!("  {}: {}:{}", "Server".cyan(), cfg.server.host, cfg.server.port);
    println!("  {}: {}", "Log Level".cyan(), cfg.server.log_level);
    println!("  {}: {}", "Log Format".cyan(), cfg.server.log_format);
    println!("  {}: {}", "Database".cyan(), cfg.database.url);
    println!();

    let logger = &cfg.logger;
    println!("{}", "Logger:".cyan());
    println!("    Min Level: {}", logger.min_level);
    println!("    Batch Size: {}", logger.batch_size);
    println!("    Flush Interval: {}ms", logger.flush_interval_ms);
    println!("    Max Buffered: {}", logger.max_buffered);
    println!("    Shutdown Timeout: {}ms", logger.shutdown_timeout_ms);
    println!(
        "    Service: {} ({})",
        logger.service, logger.environment
    );
    println!(
        "    Tracing Capture: {}",
        if logger.capture_tracing {
            "enabled".green()
        } else {
            "disabled".red()
        }
    );
    println!();

    println!(
        "  {}: {}",
        "Retention".cyan(),
        if cfg.retention.enabled {
            format!(
                "{} days, daily at {:02}:00",
                cfg.retention.days, cfg.retention.cleanup_hour
            )
            .green()
        } else {
            "disabled".red()
        }
    );

    info!("Configuration validation completed successfully");
    Ok(())
}
