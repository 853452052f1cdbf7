use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hl_cli::commands::log;
use hl_cli::{Cli, Commands, Config};

/// Handles one hook invocation end to end.
fn log_event(cli: &Cli) -> Result<()> {
    let config = Config::load_from(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load configuration, using defaults");
        Config::default()
    });
    tracing::debug!(?config, "loaded configuration");

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read hook input")?;

    match log::run(&config, &input)? {
        Some(path) => tracing::debug!(path = %path.display(), "event logged"),
        None => tracing::debug!("input ignored"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr; stdout belongs to the hook host
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("HL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Log) => {
            // A failed hook must never fail the host session
            if let Err(e) = log_event(&cli) {
                tracing::error!("failed to log hook event: {e:#}");
            }
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
