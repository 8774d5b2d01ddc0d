//! Library interface for the `bumpwatch` CLI.
//!
//! Exposes the argument parser and command implementations so they can be
//! exercised from tests. The entry point is in `main.rs`.
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output. Call once at startup.
    pub fn apply(self) {
        match self {
            Self::Auto => {}
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                Log filter (e.g., debug, bumpwatch_core=trace)
    BUMPWATCH_LOG_PATH      Write JSONL logs to this file
    BUMPWATCH_LOG_DIR       Write JSONL logs to this directory
    GITHUB_OUTPUT           Default for `check --output-file`
";

/// Command-line interface definition for bumpwatch.
#[derive(Parser)]
#[command(name = "bumpwatch")]
#[command(about = "Detect version bumps across a commit range and decide what to publish", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (merged over discovered config)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Reconstruct version history and decide whether to publish
    Check(commands::check::CheckArgs),

    /// Reconstruct version history only
    History(commands::history::HistoryArgs),

    /// Compute the next version
    Increment(commands::increment::IncrementArgs),

    /// Show package and configuration information
    Info(commands::info::InfoArgs),
}
