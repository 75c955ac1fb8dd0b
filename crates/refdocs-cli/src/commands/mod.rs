//! Command implementations for the refdocs CLI

mod read;
mod refresh;
mod search;
mod serve;
mod validate;

pub use read::execute as read_document;
pub use refresh::execute as refresh_once;
pub use search::execute as search;
pub use serve::execute as serve;
pub use validate::execute as validate;

use anyhow::{Context, Result};
use refdocs_core::{Config, DocumentStore, Pipeline};
use std::path::Path;
use std::sync::Arc;

/// Load, override and validate the configuration.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Pipeline over a fresh store, warmed from the snapshot when one exists.
fn warm_pipeline(config: &Config) -> Result<(Pipeline, Arc<DocumentStore>, bool)> {
    let store = Arc::new(DocumentStore::new());
    let pipeline = Pipeline::from_config(config, Arc::clone(&store))?;
    let warmed = pipeline.warm_start();
    Ok((pipeline, store, warmed))
}
