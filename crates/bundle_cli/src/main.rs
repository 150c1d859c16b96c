//! bundlecache: inspect, check and clear a bundle build cache.
//!
//! Provides `bundlecache status` for record counts and the persisted asset
//! index, `bundlecache check` for a dry-run freshness verdict against the
//! project's source tree, and `bundlecache clear` for wiping the store.

#![warn(missing_docs)]

mod check;
mod clear;
mod logging;
mod project;
mod status;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// bundlecache: a cache for bundler builds in static-site pipelines.
#[derive(Parser, Debug)]
#[command(name = "bundlecache", version, about = "Bundle build cache tool")]
pub struct Cli {
    /// Project directory. Defaults to the nearest ancestor holding `bundle.toml`.
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Path to an options file used instead of `<project>/bundle.toml`.
    #[arg(long, global = true)]
    pub options: Option<PathBuf>,

    /// Suppress all logging except errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show record counts and the persisted asset index.
    Status(StatusArgs),
    /// Report whether the cached build is still valid. Exits 1 when not.
    Check(CheckArgs),
    /// Remove every cached record and blob.
    Clear,
}

/// Arguments for the `bundlecache status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `bundlecache check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Source directory to read, relative to the project (default `src`).
    #[arg(long)]
    pub source: Option<PathBuf>,
}

/// Command output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Explicit project directory.
    pub project: Option<PathBuf>,
    /// Explicit options file.
    pub options: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::initialize(cli.verbose, cli.quiet, cli.log_format);

    let global = GlobalArgs {
        project: cli.project,
        options: cli.options,
    };

    let result = match cli.command {
        Command::Status(ref args) => status::run(args, &global).await,
        Command::Check(ref args) => check::run(args, &global).await,
        Command::Clear => clear::run(&global).await,
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
