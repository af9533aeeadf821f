use anyhow::Result;
use applog::config::{self, Config};
use colored::Colorize;
use tracing::info;

/// Execute the config show command
///
/// Displays the effective configuration (file plus environment overrides)
pub fn show(config_path: Option<&str>) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config(config_path)?;

    println!("{}", "Current Configuration:".green().bold());
    println!();
    println!("{}", render(&cfg)?);

    Ok(())
}

/// Execute the config validate command
pub fn validate(config_path: Option<&str>) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!("Validating configuration file");

    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Database: {}", cfg.database.url);
    println!(
        "  Batching: {} records / {}ms",
        cfg.logger.batch_size, cfg.logger.flush_interval_ms
    );
    println!(
        "  Retention: {}",
        if cfg.retention.enabled {
            format!("{} days", cfg.retention.days)
        } else {
            "disabled".to_string()
        }
    );

    Ok(())
}

fn render(cfg: &Config) -> Result<String> {
    Ok(toml::to_string_pretty(cfg)?)
}
