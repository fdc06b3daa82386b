//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::LogEntryStatus;

/// triggerd - commit log trigger dispatcher
#[derive(Parser)]
#[command(
    name = "triggerd",
    about = "Dispatch committed log entries to trigger workers",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/triggerd/logs/triggerd.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the dispatcher and worker pool until Ctrl-C
    Run {
        /// Log to stderr instead of the log file
        #[arg(long)]
        stderr: bool,
    },

    /// List entries that are not yet processed
    Pending {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Append a new entry to the commit log
    Append {
        /// Keyspace of the mutated row
        #[arg(short, long)]
        keyspace: String,

        /// Table of the mutated row
        #[arg(short, long)]
        table: String,

        /// Row key of the mutated row
        #[arg(short, long)]
        row_key: String,

        /// Initial status
        #[arg(short, long, default_value = "committed")]
        status: LogEntryStatus,
    },

    /// Record a status transition for an entry
    Status {
        /// Entry id
        id: String,

        /// New status (prepared, committed, complete, error)
        status: LogEntryStatus,
    },

    /// Rewrite the commit log keeping only the latest record per entry
    Compact,
}

/// Output format for listing commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
