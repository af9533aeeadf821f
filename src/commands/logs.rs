//! Logs query command
//!
//! Query and display stored log records straight from the SQLite store.

use anyhow::Result;
use applog::config;
use applog::pipeline::{LogLevel, StoredLog};
use applog::storage::{LogFilter, SqliteLogStore};
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use colored::Colorize;
use uuid::Uuid;

/// Query and display logs
#[derive(Debug, Clone, Parser)]
pub struct LogsArgs {
    /// Filter by log level (error, warn, info, http, verbose, debug, silly)
    #[arg(short, long)]
    pub level: Option<LogLevel>,

    /// Filter by user id
    #[arg(short, long)]
    pub user_id: Option<Uuid>,

    /// Show logs since N seconds ago (e.g., 3600 for last hour)
    #[arg(long)]
    pub since: Option<i64>,

    /// Maximum number of results
    #[arg(long, default_value = "100")]
    pub limit: u32,

    /// Skip this many of the newest matches
    #[arg(long, default_value = "0")]
    pub offset: u32,

    /// Output format (text, json)
    #[arg(short = 'f', long, default_value = "text")]
    pub format: String,

    /// Follow logs in real-time (tail -f mode)
    #[arg(long)]
    pub follow: bool,
}

impl LogsArgs {
    fn filter(&self) -> LogFilter {
        LogFilter {
            level: self.level,
            user_id: self.user_id,
            since: self
                .since
                .map(|secs| Utc::now() - ChronoDuration::seconds(secs)),
            limit: Some(self.limit),
            offset: Some(self.offset),
        }
    }
}

/// Execute the logs command
pub async fn execute(config_path: Option<&str>, args: LogsArgs) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let store = SqliteLogStore::new(&cfg.database.url, 1).await?;

    if args.follow {
        return follow_logs(&store, args.filter()).await;
    }

    let page = store.query_logs(args.filter()).await?;

    if page.logs.is_empty() {
        println!("{}", "No logs found matching the criteria".yellow());
        return Ok(());
    }

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        _ => {
            println!(
                "{}",
                format!("Showing {} of {} log entries", page.logs.len(), page.total).bold()
            );
            println!();
            // Oldest at the top, like a terminal log
            for log in page.logs.iter().rev() {
                println!("{}", format_log_line(log));
            }
        }
    }

    Ok(())
}

/// Render one record as a single colored line plus optional metadata
fn format_log_line(log: &StoredLog) -> String {
    let record = &log.record;
    let timestamp = record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

    let level = record.level.as_str().to_uppercase();
    let level_colored = match record.level {
        LogLevel::Error => level.red().bold(),
        LogLevel::Warn => level.yellow().bold(),
        LogLevel::Info => level.green(),
        LogLevel::Http => level.magenta(),
        LogLevel::Debug => level.blue(),
        _ => level.normal(),
    };

    let request_id = record
        .request_id
        .map(|id| format!(" req={}", &id.simple().to_string()[..8]))
        .unwrap_or_default();

    let mut line = format!(
        "{} {} {}{} {}",
        timestamp.dimmed(),
        level_colored,
        record.service.cyan(),
        request_id.dimmed(),
        record.message
    );

    if let Some(metadata) = record.metadata.as_ref().filter(|m| !m.is_empty()) {
        let fields = serde_json::Value::Object(metadata.clone()).to_string();
        line.push_str(&format!("\n  {}", format!("metadata: {}", fields).dimmed()));
    }

    line
}

/// Poll for new records until interrupted
async fn follow_logs(store: &SqliteLogStore, mut filter: LogFilter) -> Result<()> {
    use tokio::time::{interval, Duration};

    println!("{}", "Following logs (Ctrl+C to stop)...".bold());
    println!();

    let mut last_id = store
        .query_logs(LogFilter {
            limit: Some(1),
            ..Default::default()
        })
        .await?
        .logs
        .first()
        .map(|log| log.id)
        .unwrap_or(0);

    filter.offset = None;
    let mut poll_interval = interval(Duration::from_millis(500));

    loop {
        poll_interval.tick().await;

        let page = store.query_logs(filter.clone()).await?;
        let mut fresh: Vec<&StoredLog> =
            page.logs.iter().filter(|log| log.id > last_id).collect();
        fresh.sort_by_key(|log| log.id);

        for log in fresh {
            println!("{}", format_log_line(log));
            last_id = last_id.max(log.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use applog::pipeline::LogRecord;

    #[test]
    fn test_logs_args_parsing() {
        let args = LogsArgs::parse_from(["logs", "--level", "error", "--limit", "50"]);
        assert_eq!(args.level, Some(LogLevel::Error));
        assert_eq!(args.limit, 50);
        assert!(!args.follow);
    }

    #[test]
    fn test_logs_args_rejects_unknown_level() {
        assert!(LogsArgs::try_parse_from(["logs", "--level", "fatal"]).is_err());
    }

    #[test]
    fn test_format_log_line_includes_metadata() {
        colored::control::set_override(false);
        let mut record = LogRecord::new(LogLevel::Warn, "disk almost full");
        record.metadata = Some(
            serde_json::json!({ "free": 12 })
                .as_object()
                .cloned()
                .unwrap(),
        );
        let line = format_log_line(&StoredLog { id: 1, record });

        assert!(line.contains("WARN"));
        assert!(line.contains("disk almost full"));
        assert!(line.contains("metadata: {\"free\":12}"));
    }
}
