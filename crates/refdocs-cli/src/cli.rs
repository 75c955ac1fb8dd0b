//! # CLI Structure and Argument Parsing
//!
//! ```bash
//! # Check the route table
//! refdocs validate
//!
//! # Run one ingestion cycle and write the snapshot
//! refdocs refresh
//!
//! # Keep refreshing on the configured interval until Ctrl-C
//! refdocs serve
//!
//! # Query the last snapshot
//! refdocs search "dispatch payload" --limit 5
//! refdocs read /api/actions.html --fetch
//! ```
//!
//! Every command accepts `--config <path>` (or `REFDOCS_CONFIG`), and the
//! global logging flags `--verbose`, `--quiet` and `--log-format`.

use clap::{Parser, Subcommand, ValueEnum};
use refdocs_core::config::CONFIG_ENV;
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Main CLI structure for the `refdocs` command
#[derive(Parser, Clone, Debug)]
#[command(name = "refdocs")]
#[command(version)]
#[command(about = "Ingest, index and serve documentation tracked in upstream repositories")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file
    #[arg(short = 'c', long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Warm from the snapshot and refresh on the configured interval until interrupted
    Serve,

    /// Run a single ingestion cycle, persist the snapshot and exit
    Refresh {
        /// Output format for the cycle report
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Search the persisted index
    Search {
        /// Search query
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Read one document by permalink
    Read {
        /// Document permalink, e.g. `/api/actions.html`
        permalink: String,

        /// Ingest the document now if it is not cached
        #[arg(long)]
        fetch: bool,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Validate the configuration and route table
    Validate,
}

impl Commands {
    /// Output format requested by the command, if it prints data.
    pub const fn output_format(&self) -> Option<OutputFormat> {
        match self {
            Self::Refresh { format } | Self::Search { format, .. } | Self::Read { format, .. } => {
                Some(*format)
            },
            Self::Serve | Self::Validate => None,
        }
    }

    /// Whether the command drives ingestion and should log progress by default.
    pub const fn is_long_running(&self) -> bool {
        matches!(self, Self::Serve | Self::Refresh { .. })
    }
}
