//! Logging initialization and configuration.
//!
//! Events go to stderr so command output on stdout stays parseable.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::{Cli, LogFormat};
use crate::output::OutputFormat;

/// Initialize the logging subsystem based on CLI flags.
///
/// Ingestion commands log at info by default, query commands at warn.
/// Machine-readable output drops to error unless `--verbose` is given.
///
/// # Errors
///
/// Returns an error if the global tracing subscriber cannot be set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = select_level(cli);

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    match cli.log_format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }

    if std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }
    Ok(())
}

fn select_level(cli: &Cli) -> Level {
    if cli.verbose {
        return Level::DEBUG;
    }
    if cli.quiet || cli.command.output_format() == Some(OutputFormat::Json) {
        return Level::ERROR;
    }
    if cli.command.is_long_running() {
        Level::INFO
    } else {
        Level::WARN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn level(args: &[&str]) -> Level {
        let cli = Cli::try_parse_from(args).unwrap_or_else(|e| panic!("{e}"));
        select_level(&cli)
    }

    #[test]
    fn test_levels_follow_flags_and_command() {
        assert_eq!(level(&["refdocs", "serve"]), Level::INFO);
        assert_eq!(level(&["refdocs", "search", "x"]), Level::WARN);
        assert_eq!(level(&["refdocs", "-q", "serve"]), Level::ERROR);
        assert_eq!(level(&["refdocs", "-v", "search", "x"]), Level::DEBUG);
        assert_eq!(level(&["refdocs", "refresh", "--format", "json"]), Level::ERROR);
    }
}
