//! One ingestion cycle: resolve, fetch, render, rewrite, index, persist.
//!
//! The pipeline is the only writer to the [`DocumentStore`]. Per-document
//! failures are absorbed here and reported in the [`CycleReport`]; only a
//! failure to build the index aborts a cycle, and it leaves the store as it
//! was.

use crate::config::Config;
use crate::fetcher::{FetchedContent, GitHubClient, SourceHost};
use crate::index::{FieldBoosts, IndexBuilder, SearchIndex};
use crate::links::LinkRewriter;
use crate::render::{CmarkRenderer, MarkdownRenderer};
use crate::resolver::{NpmRegistry, PackageRegistry, RefResolver};
use crate::snapshot::{Snapshot, SnapshotStorage};
use crate::store::DocumentStore;
use crate::{Document, Error, ResolvedRefs, Result, TrackedRoute};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// A link that matched no tracked route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    /// Key of the document containing the link.
    pub key: String,
    /// Link target as written.
    pub target: String,
}

/// Outcome of one full cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Sequence number, starting at 1.
    pub cycle: u64,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle settled.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
    /// Ref used for each repository.
    pub refs: ResolvedRefs,
    /// Repositories that fell back to the default ref.
    pub fallbacks: Vec<String>,
    /// Documents in the installed corpus.
    pub documents: usize,
    /// Documents fetched with content this cycle.
    pub fetched: usize,
    /// Documents replaced by the not-found placeholder.
    pub stubbed: usize,
    /// Keys whose fetch failed hard.
    pub failed: Vec<String>,
    /// Failed keys whose previous document was kept.
    pub carried_forward: usize,
    /// Links left unrewritten.
    pub broken_links: Vec<BrokenLink>,
    /// Whether the snapshot write succeeded.
    pub persisted: bool,
}

#[derive(Debug)]
struct Ingested {
    doc: Document,
    broken_links: Vec<String>,
}

/// Drives ingestion for a fixed set of routes.
pub struct Pipeline {
    routes: Vec<TrackedRoute>,
    resolver: RefResolver,
    host: Arc<dyn SourceHost>,
    renderer: Arc<dyn MarkdownRenderer>,
    rewriter: LinkRewriter,
    store: Arc<DocumentStore>,
    snapshot: Option<SnapshotStorage>,
    boosts: FieldBoosts,
    last_refs: ResolvedRefs,
    cycles: u64,
}

impl Pipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        routes: Vec<TrackedRoute>,
        resolver: RefResolver,
        host: Arc<dyn SourceHost>,
        renderer: Arc<dyn MarkdownRenderer>,
        store: Arc<DocumentStore>,
    ) -> Result<Self> {
        let rewriter = LinkRewriter::new(&routes)?;
        Ok(Self {
            routes,
            resolver,
            host,
            renderer,
            rewriter,
            store,
            snapshot: None,
            boosts: FieldBoosts::default(),
            last_refs: ResolvedRefs::default(),
            cycles: 0,
        })
    }

    /// Build the production pipeline for a validated configuration.
    pub fn from_config(config: &Config, store: Arc<DocumentStore>) -> Result<Self> {
        let timeout = Duration::from_secs(config.source_host.timeout_secs);
        let host: Arc<dyn SourceHost> = Arc::new(GitHubClient::from_config(&config.source_host)?);
        let registry: Arc<dyn PackageRegistry> =
            Arc::new(NpmRegistry::from_config(&config.registry, timeout)?);
        let resolver = RefResolver::new(registry, Arc::clone(&host), config.refresh.default_ref.clone());

        Ok(Self::new(
            config.tracked_routes(),
            resolver,
            host,
            Arc::new(CmarkRenderer),
            store,
        )?
        .with_snapshot(SnapshotStorage::new(config.snapshot_path()?)))
    }

    /// Persist a snapshot at the end of every cycle.
    #[must_use]
    pub fn with_snapshot(mut self, storage: SnapshotStorage) -> Self {
        self.snapshot = Some(storage);
        self
    }

    /// Override the query-time field boosts.
    #[must_use]
    pub fn with_boosts(mut self, boosts: FieldBoosts) -> Self {
        self.boosts = boosts;
        self
    }

    /// The store this pipeline writes to.
    pub const fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Configured routes.
    pub fn routes(&self) -> &[TrackedRoute] {
        &self.routes
    }

    /// Refs used by the most recent cycle.
    pub const fn last_refs(&self) -> &ResolvedRefs {
        &self.last_refs
    }

    /// Content route serving `key`, if any.
    pub fn content_route(&self, key: &str) -> Option<&TrackedRoute> {
        self.routes
            .iter()
            .find(|r| r.is_content() && r.permalink == key)
    }

    /// Load the snapshot into the store, if one is configured and readable.
    pub fn warm_start(&self) -> bool {
        let Some(storage) = &self.snapshot else {
            return false;
        };
        match storage.restore() {
            Some((docs, index)) => {
                self.store.install(docs, index);
                true
            },
            None => false,
        }
    }

    /// Run one complete cycle and install its results.
    ///
    /// Returns an error only when the index cannot be built; the store is
    /// untouched in that case.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycles += 1;
        let cycle = self.cycles;
        let started_at = Utc::now();
        let timer = Instant::now();
        info!(cycle, routes = self.routes.len(), "Starting refresh cycle");

        let (refs, resolutions) = self.resolver.resolve_all(&self.routes).await;
        let fallbacks: Vec<String> = resolutions
            .iter()
            .filter(|(_, r)| r.fell_back)
            .map(|(repo, _)| repo.clone())
            .collect();

        let routes: Vec<TrackedRoute> = self
            .routes
            .iter()
            .filter(|r| r.is_content())
            .map(|r| annotate(r, &refs))
            .collect();

        // Barrier: every fetch settles before anything is installed.
        let outcomes = join_all(routes.iter().map(|route| self.ingest(route))).await;

        let mut docs = Vec::with_capacity(outcomes.len());
        let mut fetched = 0;
        let mut stubbed = 0;
        let mut failed = Vec::new();
        let mut carried_forward = 0;
        let mut broken_links = Vec::new();

        for (route, outcome) in routes.iter().zip(outcomes) {
            match outcome {
                Ok(ingested) => {
                    if ingested.doc.stub {
                        stubbed += 1;
                    } else {
                        fetched += 1;
                    }
                    broken_links.extend(ingested.broken_links.into_iter().map(|target| BrokenLink {
                        key: ingested.doc.key.clone(),
                        target,
                    }));
                    docs.push(ingested.doc);
                },
                Err(e) => {
                    warn!(key = %route.permalink, error = %e, "Fetch failed");
                    failed.push(route.permalink.clone());
                    if let Some(previous) = self.store.get(&route.permalink) {
                        carried_forward += 1;
                        docs.push(Document::clone(&previous));
                    }
                },
            }
        }

        let index = SearchIndex::build(self.boosts, &docs)?;
        let snapshot = self.snapshot.as_ref().map(|_| Snapshot::new(docs.clone(), &index));
        let documents = docs.len();
        self.store.install(docs, index);
        self.last_refs = refs.clone();

        let persisted = match (&self.snapshot, snapshot) {
            (Some(storage), Some(snapshot)) => match storage.persist(snapshot).await {
                Ok(()) => true,
                Err(e) => {
                    error!(path = %storage.path().display(), error = %e, "Failed to persist snapshot");
                    false
                },
            },
            _ => false,
        };

        let elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            cycle,
            documents,
            fetched,
            stubbed,
            failed = failed.len(),
            broken_links = broken_links.len(),
            persisted,
            elapsed_ms,
            "Refresh cycle finished"
        );

        Ok(CycleReport {
            cycle,
            started_at,
            finished_at: Utc::now(),
            elapsed_ms,
            refs,
            fallbacks,
            documents,
            fetched,
            stubbed,
            failed,
            carried_forward,
            broken_links,
            persisted,
        })
    }

    /// Ingest a single document between cycles.
    ///
    /// The new document is added to a fresh index built from the current
    /// corpus and both are swapped in together. Nothing is persisted; the
    /// next cycle writes the snapshot.
    pub async fn ingest_key(&self, key: &str) -> Result<Arc<Document>> {
        let route = self
            .content_route(key)
            .ok_or_else(|| Error::NotFound(format!("No content route for {key}")))?;

        let mut route = route.clone();
        if route.explicit_ref.is_none() {
            route.resolved_ref = match route.repo.as_deref().and_then(|repo| self.last_refs.get(repo)) {
                Some(git_ref) => Some(git_ref.to_string()),
                None => match (route.package_name(), route.repo.as_deref()) {
                    (Some(package), Some(repo)) => Some(self.resolver.resolve(package, repo).await.git_ref),
                    _ => None,
                },
            };
        }

        let ingested = self.ingest(&route).await?;
        let corpus = self.store.corpus();
        let mut builder = IndexBuilder::new(self.boosts)?;
        builder.extend(corpus.iter().map(AsRef::as_ref));
        builder.add_document(&ingested.doc);
        let index = builder.build()?;

        self.store.put_indexed(ingested.doc, index);
        info!(%key, "Ingested document on demand");
        self.store
            .get(key)
            .ok_or_else(|| Error::Other(format!("Document {key} vanished after ingestion")))
    }

    async fn ingest(&self, route: &TrackedRoute) -> Result<Ingested> {
        let (Some(repo), Some(path)) = (route.repo.as_deref(), route.path.as_deref()) else {
            return Err(Error::NotFound(format!("Route {} has no upstream path", route.id)));
        };
        let git_ref = route.effective_ref();

        let (body, stub, broken_links) = match self.host.fetch_contents(repo, path, git_ref).await? {
            FetchedContent::Found(markdown) => {
                let html = self.renderer.render(&markdown);
                let outcome = self.rewriter.rewrite(&route.permalink, repo, path, &html);
                (outcome.body, false, outcome.broken_links)
            },
            FetchedContent::NotFound => {
                info!(key = %route.permalink, %repo, %path, "Upstream file missing, serving stub");
                (Document::not_found_body(path), true, Vec::new())
            },
        };

        Ok(Ingested {
            doc: Document {
                key: route.permalink.clone(),
                body,
                title: route.title.clone(),
                description: route.description.clone(),
                permalink: route.permalink.clone(),
                repo: repo.to_string(),
                path: path.to_string(),
                git_ref: git_ref.map(str::to_string),
                stub,
            },
            broken_links,
        })
    }
}

fn annotate(route: &TrackedRoute, refs: &ResolvedRefs) -> TrackedRoute {
    let mut route = route.clone();
    route.resolved_ref = route
        .repo
        .as_deref()
        .and_then(|repo| refs.get(repo))
        .map(str::to_string);
    route
}
