//! Configuration check.

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::Path;

use super::load_config;

/// Validate the configuration and print a summary of the route table.
pub fn execute(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let routes = config.tracked_routes();
    let content: Vec<_> = routes.iter().filter(|r| r.is_content()).collect();
    let repos: BTreeSet<&str> = content.iter().filter_map(|r| r.repo.as_deref()).collect();

    println!(
        "{} {} routes ({} with content) across {} repositories",
        "Valid:".green().bold(),
        routes.len(),
        content.len(),
        repos.len()
    );
    for repo in repos {
        println!("  {repo}");
    }
    println!("Snapshot: {}", config.snapshot_path()?.display());
    Ok(())
}
