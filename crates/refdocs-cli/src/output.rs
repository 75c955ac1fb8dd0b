//! Output formatting for command results.

use colored::Colorize;
use refdocs_core::{CycleReport, ReadResponse, SearchHit};
use serde::Serialize;

/// Output format for commands that print data
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// Pretty-printed JSON
    Json,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a cycle report.
pub fn print_report(report: &CycleReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    println!(
        "{} cycle {} in {}ms",
        "Refreshed".green().bold(),
        report.cycle,
        report.elapsed_ms
    );
    for (repo, git_ref) in report.refs.iter() {
        let note = if report.fallbacks.iter().any(|r| r == repo) {
            " (default)".yellow().to_string()
        } else {
            String::new()
        };
        println!("  {repo} @ {}{note}", git_ref.cyan());
    }
    println!(
        "  documents: {}  fetched: {}  stubbed: {}  failed: {}",
        report.documents,
        report.fetched,
        report.stubbed,
        report.failed.len()
    );
    for key in &report.failed {
        println!("  {} {key}", "failed".red());
    }
    for link in &report.broken_links {
        println!("  {} {} -> {}", "broken link".yellow(), link.key, link.target);
    }
    if !report.persisted {
        println!("  {}", "snapshot not written".red());
    }
    Ok(())
}

/// Print search hits.
pub fn print_hits(query: &str, hits: &[SearchHit], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(hits);
    }

    if hits.is_empty() {
        println!("No results for \"{query}\"");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} {} {}",
            rank + 1,
            hit.title.bold(),
            hit.permalink.cyan(),
            format!("({:.2})", hit.score).dimmed()
        );
        if !hit.snippet.is_empty() {
            println!("   {}", hit.snippet);
        }
    }
    Ok(())
}

/// Print a read response.
pub fn print_read(response: &ReadResponse, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(response);
    }
    if response.pending {
        eprintln!("{} {}", "pending".yellow(), response.key);
    }
    println!("{}", response.content);
    Ok(())
}
