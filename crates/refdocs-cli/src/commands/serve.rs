//! Long-running refresh loop with a line-oriented read interface.
//!
//! Each line on stdin is a permalink; each answer is one JSON object
//! `{"key", "content", "pending"}` on stdout. Unknown permalinks produce
//! `{"key", "error"}`.

use anyhow::Result;
use refdocs_core::{IntervalTicker, ReadService, RefreshScheduler};
use serde_json::json;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::{load_config, warm_pipeline};

/// Warm the store, then refresh on the configured interval until Ctrl-C.
///
/// Closing stdin stops the read interface but not the scheduler.
pub async fn execute(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let (pipeline, store, warmed) = warm_pipeline(&config)?;
    info!(documents = store.len(), warmed, "Store ready");

    let interval = config.refresh.interval();
    let scheduler = RefreshScheduler::new(pipeline, IntervalTicker::new(interval));
    let reads = ReadService::new(store, &config.tracked_routes(), scheduler.requests());
    let handle = scheduler.spawn();
    info!(interval_secs = interval.as_secs(), "Scheduler started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupt received; stopping after the current cycle");
                break;
            },
            line = lines.next_line(), if input_open => match line? {
                Some(line) => answer(&reads, line.trim()),
                None => input_open = false,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn answer(reads: &ReadService, key: &str) {
    if key.is_empty() {
        return;
    }
    let value = match reads.read(key) {
        Ok(result) => serde_json::to_value(result.to_response()).unwrap_or_default(),
        Err(e) => json!({ "key": key, "error": e.to_string() }),
    };
    println!("{value}");
}
