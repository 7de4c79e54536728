//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Call-state tracker and notification relay.
///
/// Detects missed calls from telephony transitions and mirrors the active
/// notification set to one registered consumer.
#[derive(Debug, Parser)]
#[command(name = "cw", version, about, long_about = None)]
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
    /// Replay a JSONL scenario against a simulated device.
    Replay {
        /// Scenario file, one step per line.
        scenario: PathBuf,

        /// Emit one JSON object per output line.
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved configuration.
    Config,
}
