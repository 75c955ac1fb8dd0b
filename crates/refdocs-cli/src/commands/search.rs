//! Search over the persisted index.

use anyhow::{Result, bail};
use std::path::Path;

use super::{load_config, warm_pipeline};
use crate::output::{OutputFormat, print_hits};

/// Search the last snapshot.
pub fn execute(
    config_path: Option<&Path>,
    query: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let config = load_config(config_path)?;
    let (_pipeline, store, warmed) = warm_pipeline(&config)?;
    if !warmed {
        bail!(
            "no snapshot at {}; run `refdocs refresh` first",
            config.snapshot_path()?.display()
        );
    }

    let hits = store.search(query, limit)?;
    print_hits(query, &hits, format)
}
