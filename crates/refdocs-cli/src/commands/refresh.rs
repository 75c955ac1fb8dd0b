//! Single ingestion cycle.

use anyhow::{Context, Result};
use refdocs_core::{DocumentStore, Pipeline};
use std::path::Path;
use std::sync::Arc;

use super::load_config;
use crate::output::{OutputFormat, print_report};

/// Run one cycle, persist the snapshot and print the report.
pub async fn execute(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let mut pipeline = Pipeline::from_config(&config, Arc::new(DocumentStore::new()))?;
    // Carry forward documents whose fetch fails this time.
    pipeline.warm_start();

    let report = pipeline.run_cycle().await.context("refresh cycle failed")?;
    print_report(&report, format)
}
