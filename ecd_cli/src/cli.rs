//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "ecd", version, about = "Electrochromic display driver")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/ecd_config.toml")]
    pub config: PathBuf,

    /// Print results and log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Color every segment, then bleach every segment
    Init,
    /// Color the listed segments and bleach all others
    Show {
        /// Segment indices to color, comma separated (e.g. 0,2,5)
        #[arg(long, value_name = "SEGMENTS", value_delimiter = ',')]
        color: Vec<usize>,
    },
    /// Bleach every segment
    Clear,
    /// Show a pattern, then keep it up with periodic OCP checks and refresh
    Refresh {
        /// Segment indices to color, comma separated (e.g. 0,2,5)
        #[arg(long, value_name = "SEGMENTS", value_delimiter = ',')]
        color: Vec<usize>,
        /// Maintenance passes to run after the pattern is shown
        #[arg(long, value_name = "N", default_value_t = 1)]
        cycles: u32,
        /// Wait between maintenance passes
        #[arg(long = "interval-ms", value_name = "MS", default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Print the calibrated refresh thresholds
    Thresholds {
        /// Supply voltage to calibrate for (defaults to supply.voltage_v)
        #[arg(long, value_name = "VOLTS")]
        supply: Option<f32>,
    },
    /// Validate the config and exercise the backend once
    SelfCheck,
}

#[inline]
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}
