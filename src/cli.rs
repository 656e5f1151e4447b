// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `batchflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "batchflow",
    version,
    about = "Run a hierarchical batch flow of shell commands to completion.",
    long_about = None
)]
pub struct CliArgs {
    /// Flow definition to run (TOML, or JSON when the file ends in `.json`).
    #[arg(long, value_name = "PATH")]
    pub flow: PathBuf,

    /// Runner settings file (TOML).
    ///
    /// Default: `Batchflow.toml` in the current working directory, if it
    /// exists; built-in defaults otherwise.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BATCHFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Compile the flow and print its task tree without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[executor].max_workers`.
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
