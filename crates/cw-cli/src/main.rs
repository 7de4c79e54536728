use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cw_cli::commands::{config, replay};
use cw_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Replay { scenario, json }) => {
            let config =
                Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
            tracing::debug!(?config, "loaded configuration");
            replay::run(&mut std::io::stdout().lock(), &config, scenario, *json)?;
        }
        Some(Commands::Config) => {
            let config =
                Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
            config::run(&mut std::io::stdout().lock(), &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
