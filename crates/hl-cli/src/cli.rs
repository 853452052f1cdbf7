//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Agent hook logger.
///
/// Normalizes lifecycle events from a coding agent's hooks into one JSONL
/// log per session, linking subagents back to the calls that spawned them.
#[derive(Debug, Parser)]
#[command(name = "hl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log one hook event read as JSON from stdin.
    ///
    /// Always exits successfully so the host session is never blocked;
    /// failures are reported on stderr.
    Log,
}
