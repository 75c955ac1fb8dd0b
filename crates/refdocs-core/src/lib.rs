//! # refdocs-core
//!
//! Documentation ingestion and search indexing for a documentation site that
//! tracks markdown files living in upstream repositories.
//!
//! Each refresh cycle:
//!
//! 1. resolves, per repository, the branch matching the package's published
//!    version ([`RefResolver`]),
//! 2. fetches every tracked markdown file at that ref ([`SourceHost`]),
//! 3. renders it and rewrites links between tracked files into site
//!    permalinks ([`LinkRewriter`]),
//! 4. rebuilds the full-text index and swaps corpus and index into the
//!    [`DocumentStore`] together,
//! 5. persists a [`Snapshot`] for warm starts.
//!
//! The [`RefreshScheduler`] repeats the cycle on a fixed interval. Reads go
//! through [`ReadService`], which never waits on the network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use refdocs_core::{Config, DocumentStore, IntervalTicker, Pipeline, ReadService, RefreshScheduler};
//! use std::sync::Arc;
//!
//! # async fn run() -> refdocs_core::Result<()> {
//! let config = Config::load()?;
//! config.validate()?;
//!
//! let store = Arc::new(DocumentStore::new());
//! let pipeline = Pipeline::from_config(&config, Arc::clone(&store))?;
//! pipeline.warm_start();
//!
//! let scheduler = RefreshScheduler::new(pipeline, IntervalTicker::new(config.refresh.interval()));
//! let reads = ReadService::new(store, &config.tracked_routes(), scheduler.requests());
//! let handle = scheduler.spawn();
//!
//! let result = reads.read("/quick-start.html")?;
//! println!("{}", result.content());
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

/// Configuration file loading and validation
pub mod config;
/// Error types and result aliases
pub mod error;
/// Source host contents and branches API
pub mod fetcher;
/// Full-text search index
pub mod index;
/// Link rewriting between tracked documents
pub mod links;
/// Ingestion cycle
pub mod pipeline;
/// Non-blocking read path
pub mod read;
/// Markdown rendering
pub mod render;
/// Published-version ref resolution
pub mod resolver;
/// Periodic refresh scheduling
pub mod scheduler;
/// Snapshot persistence
pub mod snapshot;
/// In-memory document store
pub mod store;
/// Core data types
pub mod types;

pub use config::{
    Config, PathsConfig, RefreshConfig, RegistryConfig, RouteConfig, SourceHostConfig,
};
pub use error::{Error, Result};
pub use fetcher::{Credentials, FetchedContent, GitHubClient, SourceHost};
pub use index::{FieldBoosts, IndexBuilder, IndexEntry, SearchIndex, SerializedIndex};
pub use links::{LinkRewriter, RewriteOutcome, RouteTable};
pub use pipeline::{BrokenLink, CycleReport, Pipeline};
pub use read::{FetchRequest, ReadResponse, ReadResult, ReadService};
pub use render::{CmarkRenderer, MarkdownRenderer};
pub use resolver::{NpmRegistry, PackageRegistry, RefResolver, Resolution};
pub use scheduler::{IntervalTicker, RefreshScheduler, SchedulerHandle, SchedulerState, Ticker};
pub use snapshot::{Snapshot, SnapshotStorage};
pub use store::DocumentStore;
pub use types::{Document, ResolvedRefs, SearchHit, TrackedRoute};
