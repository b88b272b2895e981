// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `tdaemon`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tdaemon",
    version,
    about = "Watch a project and re-run the tests of only the apps that changed.",
    long_about = None
)]
pub struct CliArgs {
    /// Project directory to watch.
    ///
    /// Overrides `[project].root` from the config file.
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Tdaemon.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// App to scope test runs to. Repeat for several apps.
    ///
    /// Replaces `[project].apps` from the config file.
    #[arg(long = "app", value_name = "NAME")]
    pub apps: Vec<String>,

    /// Test command, split on whitespace (e.g. "python manage.py test").
    ///
    /// App names are appended for scoped runs.
    #[arg(long, value_name = "CMD")]
    pub command: Option<String>,

    /// Coalescing window in milliseconds.
    #[arg(long, value_name = "MS")]
    pub coalesce_ms: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TDAEMON_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the configuration, but don't watch anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Don't read `p` (pause/resume) and `q` (quit) commands from stdin.
    #[arg(long)]
    pub no_stdin: bool,
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
