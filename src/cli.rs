use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "applog", version, about = "Batched application log service")]
pub struct Cli {
    /// Configuration file path (defaults to ./config.toml if present)
    #[arg(short, long, global = true, env = "APPLOG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the log service (default)
    Start,

    /// Test configuration file validity
    Test,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Query stored log records
    Logs(crate::commands::logs::LogsArgs),

    /// Delete log records older than N days
    Purge {
        /// Retention in days
        #[arg(short, long, default_value = "30")]
        days: u32,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display the effective configuration
    Show,

    /// Validate configuration file
    Validate,
}

impl Cli {
    /// Get the command to execute, defaulting to Start if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config.as_deref().and_then(|p| p.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_start() {
        let cli = Cli {
            config: None,
            command: None,
        };

        assert!(matches!(cli.get_command(), Commands::Start));
    }

    #[test]
    fn test_cli_parsing_global_config() {
        let args = vec!["applog", "test", "--config", "/etc/applog.toml"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert!(matches!(cli.get_command(), Commands::Test));
        assert_eq!(cli.config_path(), Some("/etc/applog.toml"));
    }

    #[test]
    fn test_cli_parsing_purge() {
        let args = vec!["applog", "purge", "--days", "7", "--yes"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.get_command() {
            Commands::Purge { days, yes } => {
                assert_eq!(days, 7);
                assert!(yes);
            }
            _ => panic!("Expected Purge command"),
        }
    }

    #[test]
    fn test_cli_parsing_config_show() {
        let args = vec!["applog", "config", "show"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.get_command() {
            Commands::Config { action } => {
                assert!(matches!(action, ConfigCommands::Show));
            }
            _ => panic!("Expected Config command"),
        }
    }
}
