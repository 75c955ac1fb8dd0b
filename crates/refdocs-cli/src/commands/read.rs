//! Read one document by permalink.

use anyhow::Result;
use refdocs_core::{ReadService, read::REQUEST_QUEUE_CAPACITY};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

use super::{load_config, warm_pipeline};
use crate::output::{OutputFormat, print_read};

/// Read `permalink` from the snapshot.
///
/// A miss prints the pending placeholder. With `fetch`, queued ingestion
/// requests are drained in-process and the read is retried.
pub async fn execute(
    config_path: Option<&Path>,
    permalink: &str,
    fetch: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = load_config(config_path)?;
    let (pipeline, store, _warmed) = warm_pipeline(&config)?;
    let (tx, mut rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
    let reads = ReadService::new(Arc::clone(&store), pipeline.routes(), tx);

    let mut result = reads.read(permalink)?;
    if result.is_pending() && fetch {
        while let Ok(request) = rx.try_recv() {
            if let Err(e) = pipeline.ingest_key(&request.key).await {
                warn!(key = %request.key, error = %e, "Ingestion failed");
            }
        }
        result = reads.read(permalink)?;
    }

    print_read(&result.to_response(), format)
}
