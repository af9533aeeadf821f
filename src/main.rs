use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use applog::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.get_command();

    // The server sets up tracing itself once its config is loaded
    if !matches!(command, cli::Commands::Start) {
        init_tracing("warn", "text", false);
    }

    match command {
        cli::Commands::Start => {
            commands::start::execute(args.config.clone()).await?;
        }
        cli::Commands::Test => {
            commands::test::execute(args.config_path())?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(args.config_path())?,
            cli::ConfigCommands::Validate => commands::config::validate(args.config_path())?,
        },
        cli::Commands::Logs(logs_args) => {
            commands::logs::execute(args.config_path(), logs_args).await?;
        }
        cli::Commands::Purge { days, yes } => {
            commands::purge::execute(args.config_path(), days, yes).await?;
        }
        cli::Commands::Version => {
            println!("applog v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
