use crate::pipeline::validator::{MAX_ENVIRONMENT_LEN, MAX_SERVICE_LEN, MAX_VERSION_LEN};
use crate::pipeline::{LogLevel, RecordDefaults};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "config";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Console filter directive, e.g. "info" or "applog=debug,sqlx=warn"
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggerConfig {
    /// Least severe level that is still persisted
    #[serde(default = "default_min_level")]
    pub min_level: LogLevel,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Upper bound of buffered records; the oldest is evicted beyond it
    #[serde(default = "default_max_buffered")]
    pub max_buffered: usize,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Forward application `tracing` events into the store
    #[serde(default)]
    pub capture_tracing: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_retention_days")]
    pub days: u32,
    #[serde(default = "default_cleanup_hour")]
    pub cleanup_hour: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_database_url() -> String {
    "sqlite:./data/logs.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_level() -> LogLevel {
    LogLevel::Info
}

fn default_batch_size() -> usize {
    10
}

fn default_flush_interval_ms() -> u64 {
    5000
}

fn default_max_buffered() -> usize {
    10_000
}

fn default_shutdown_timeout_ms() -> u64 {
    2000
}

fn default_environment() -> String {
    crate::pipeline::validator::DEFAULT_ENVIRONMENT.to_string()
}

fn default_service() -> String {
    crate::pipeline::validator::DEFAULT_SERVICE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> u32 {
    30
}

fn default_cleanup_hour() -> u32 {
    3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: default_min_level(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_buffered: default_max_buffered(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            environment: default_environment(),
            service: default_service(),
            version: None,
            capture_tracing: false,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            days: default_retention_days(),
            cleanup_hour: default_cleanup_hour(),
        }
    }
}

impl LoggerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn record_defaults(&self) -> RecordDefaults {
        RecordDefaults {
            environment: self.environment.clone(),
            service: self.service.clone(),
            version: self.version.clone(),
        }
    }
}

/// Load configuration from an optional TOML file plus `APPLOG__*` variables
///
/// The file is optional; every field has a default.
pub fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    let file = match path {
        // An explicit path must exist
        Some(path) => config::File::with_name(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let config = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("APPLOG")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if !matches!(cfg.server.log_format.as_str(), "text" | "json") {
        anyhow::bail!(
            "server.log_format must be 'text' or 'json', got '{}'",
            cfg.server.log_format
        );
    }

    if cfg.database.url.is_empty() {
        anyhow::bail!("database.url cannot be empty");
    }
    if cfg.database.max_connections == 0 {
        anyhow::bail!("database.max_connections must be at least 1");
    }

    let logger = &cfg.logger;
    if logger.batch_size == 0 {
        anyhow::bail!("logger.batch_size must be at least 1");
    }
    if logger.max_buffered < logger.batch_size {
        anyhow::bail!(
            "logger.max_buffered ({}) must not be smaller than logger.batch_size ({})",
            logger.max_buffered,
            logger.batch_size
        );
    }
    if logger.flush_interval_ms == 0 {
        anyhow::bail!("logger.flush_interval_ms must be greater than 0");
    }
    if logger.shutdown_timeout_ms == 0 {
        anyhow::bail!("logger.shutdown_timeout_ms must be greater than 0");
    }

    // The validator would silently fall back to defaults for these
    if logger.environment.is_empty() || logger.environment.chars().count() > MAX_ENVIRONMENT_LEN {
        anyhow::bail!("logger.environment must be 1-{} characters", MAX_ENVIRONMENT_LEN);
    }
    if logger.service.is_empty() || logger.service.chars().count() > MAX_SERVICE_LEN {
        anyhow::bail!("logger.service must be 1-{} characters", MAX_SERVICE_LEN);
    }
    if let Some(version) = &logger.version {
        if version.chars().count() > MAX_VERSION_LEN {
            anyhow::bail!("logger.version must be at most {} characters", MAX_VERSION_LEN);
        }
    }

    if cfg.retention.days == 0 {
        anyhow::bail!("retention.days must be at least 1");
    }
    if cfg.retention.cleanup_hour > 23 {
        anyhow::bail!("retention.cleanup_hour must be between 0 and 23");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate_config(&cfg).is_ok());
        assert_eq!(cfg.logger.batch_size, 10);
        assert_eq!(cfg.logger.flush_interval(), Duration::from_secs(5));
        assert_eq!(cfg.logger.shutdown_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.logger.environment, "development");
        assert_eq!(cfg.logger.service, "app");
    }

    #[test]
    fn test_validate_config_rejects_zero_batch_size() {
        let mut cfg = Config::default();
        cfg.logger.batch_size = 0;

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("batch_size"));
    }

    #[test]
    fn test_validate_config_rejects_small_buffer() {
        let mut cfg = Config::default();
        cfg.logger.batch_size = 50;
        cfg.logger.max_buffered = 10;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_config_rejects_bad_log_format() {
        let mut cfg = Config::default();
        cfg.server.log_format = "xml".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_load_config_from_file_with_partial_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[logger]
min_level = "debug"
batch_size = 25
service = "billing"

[retention]
days = 7
"#
        )
        .unwrap();

        let cfg = load_config(file.path().to_str()).unwrap();
        assert_eq!(cfg.logger.min_level, LogLevel::Debug);
        assert_eq!(cfg.logger.batch_size, 25);
        assert_eq!(cfg.logger.service, "billing");
        assert_eq!(cfg.logger.flush_interval_ms, 5000);
        assert_eq!(cfg.retention.days, 7);
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn test_load_config_missing_explicit_file_fails() {
        assert!(load_config(Some("/nonexistent/applog-config.toml")).is_err());
    }
}
