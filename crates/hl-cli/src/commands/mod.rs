//! CLI subcommand implementations.

pub mod log;
