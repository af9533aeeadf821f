use anyhow::Result;
use applog::config;
use applog::storage::{run_cleanup_now, SqliteLogStore};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use tracing::info;

/// Execute the purge command
///
/// Deletes records older than `days` from the store, asking first unless
/// `yes` is set.
pub async fn execute(config_path: Option<&str>, days: u32, yes: bool) -> Result<()> {
    if days == 0 {
        anyhow::bail!("--days must be at least 1");
    }

    let cfg = config::load_config(config_path)?;

    if !yes && !confirm(days, &cfg.database.url)? {
        println!("{}", "Aborted".yellow());
        return Ok(());
    }

    let store = SqliteLogStore::new(&cfg.database.url, 1).await?;
    let deleted = run_cleanup_now(&store, days).await?;

    info!(deleted, days, "Purged log records");
    println!(
        "{}",
        format!("✓ Deleted {} log records older than {} days", deleted, days).green()
    );

    Ok(())
}

fn confirm(days: u32, database_url: &str) -> Result<bool> {
    print!(
        "Delete all log records older than {} days from {}? [y/N] ",
        days, database_url
    );
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;

    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
