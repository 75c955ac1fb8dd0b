//! refdocs CLI - documentation ingestion and search
//!
//! Entry point for the `refdocs` binary. Each subcommand lives in its own
//! module under `commands`.

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod output;
mod utils;

use cli::{Cli, Commands};
use utils::logging::initialize_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;
    execute_command(cli).await
}

async fn execute_command(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve => commands::serve(config).await,
        Commands::Refresh { format } => commands::refresh_once(config, format).await,
        Commands::Search {
            query,
            limit,
            format,
        } => commands::search(config, &query.join(" "), limit, format),
        Commands::Read {
            permalink,
            fetch,
            format,
        } => commands::read_document(config, &permalink, fetch, format).await,
        Commands::Validate => commands::validate(config),
    }
}
