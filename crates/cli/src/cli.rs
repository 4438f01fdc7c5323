//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Stim Syncer - temporal synchronization for stimulus presentation
#[derive(Parser, Debug)]
#[command(
    name = "stim-syncer",
    author,
    version,
    about = "Stimulus timing synchronization runner",
    long_about = "Temporal synchronization for psychophysics-style stimulus \n\
                  presentation.\n\n\
                  Tracks swap events per source (display, audio, clock), fits \n\
                  per-source linear timing models, and drives a slide \n\
                  presentation against the predicted swap schedule."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STIM_SYNCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "STIM_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a demo presentation session against mock sources
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "experiment.toml",
        env = "STIM_SYNCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override display refresh rate (Hz) from configuration
    #[arg(long, env = "STIM_SYNCER_REFRESH_RATE")]
    pub refresh_rate: Option<f64>,

    /// Number of demo slides to present
    #[arg(long, default_value = "5", env = "STIM_SYNCER_SLIDES")]
    pub slides: usize,

    /// Intended duration of each demo slide in milliseconds
    #[arg(long, default_value = "500", env = "STIM_SYNCER_SLIDE_DURATION_MS")]
    pub slide_duration_ms: f64,

    /// Session timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "STIM_SYNCER_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "STIM_SYNCER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "experiment.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file (omit to show defaults)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
