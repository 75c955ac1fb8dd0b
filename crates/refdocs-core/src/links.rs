//! Rewrites links between tracked markdown sources into site permalinks.
//!
//! Rendered documents still point at upstream `.md` files. Every such link is
//! resolved against the route table and, when it names a tracked document,
//! replaced by that document's permalink. Replacements are literal substring
//! substitutions on the rendered output; unresolvable links are left alone
//! and reported as broken.

use crate::{Error, Result, TrackedRoute};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use url::Url;

const LINK_PATTERN: &str = r##"href="([^"#?]+\.md)([#?][^"]*)?""##;

#[derive(Debug, Clone)]
struct RouteEntry {
    repo: String,
    path: String,
    permalink: String,
}

/// Lookup table from upstream locations to permalinks.
///
/// Relative links resolve through an exact `(repo, path)` map. Absolute URLs
/// match the route whose upstream path is the longest substring of the URL;
/// equal lengths go to the route with the smallest identifier.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    by_location: HashMap<(String, String), String>,
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build the table from content routes; non-content routes are ignored.
    pub fn new(routes: &[TrackedRoute]) -> Self {
        let mut sorted: Vec<&TrackedRoute> = routes.iter().filter(|r| r.is_content()).collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut table = Self::default();
        for route in sorted {
            let (Some(repo), Some(path)) = (&route.repo, &route.path) else {
                continue;
            };
            let path = path.trim_start_matches('/').to_string();
            table
                .by_location
                .entry((repo.clone(), path.clone()))
                .or_insert_with(|| route.permalink.clone());
            table.entries.push(RouteEntry {
                repo: repo.clone(),
                path,
                permalink: route.permalink.clone(),
            });
        }
        table
    }

    /// Permalink for an exact upstream location.
    pub fn lookup(&self, repo: &str, path: &str) -> Option<&str> {
        self.by_location
            .get(&(repo.to_string(), path.to_string()))
            .map(String::as_str)
    }

    /// Permalink for an absolute URL that embeds a tracked upstream path.
    pub fn lookup_url(&self, url: &str) -> Option<&str> {
        let mut best: Option<&RouteEntry> = None;
        for entry in &self.entries {
            if !url.contains(entry.path.as_str()) {
                continue;
            }
            if best.is_none_or(|b| entry.path.len() > b.path.len()) {
                best = Some(entry);
            }
        }
        best.map(|e| e.permalink.as_str())
    }

    /// Number of content routes in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no content routes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the `(repo, path)` locations known to the table.
    pub fn locations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|e| (e.repo.as_str(), e.path.as_str()))
    }
}

/// Result of rewriting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Body with resolvable links replaced.
    pub body: String,
    /// Number of distinct link targets rewritten.
    pub rewritten: usize,
    /// Link targets that matched no route, in order of appearance.
    pub broken_links: Vec<String>,
}

/// Link rewriting pass over rendered documents.
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    table: RouteTable,
    pattern: Regex,
}

impl LinkRewriter {
    /// Create a rewriter over the given routes.
    pub fn new(routes: &[TrackedRoute]) -> Result<Self> {
        let pattern = Regex::new(LINK_PATTERN)
            .map_err(|e| Error::Other(format!("Invalid link pattern: {e}")))?;
        Ok(Self {
            table: RouteTable::new(routes),
            pattern,
        })
    }

    /// The route table used for lookups.
    pub const fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Rewrite `.md` links in `body`, which was rendered from `repo`/`doc_path`.
    ///
    /// `key` only labels broken-link warnings.
    pub fn rewrite(&self, key: &str, repo: &str, doc_path: &str, body: &str) -> RewriteOutcome {
        let mut seen = HashSet::new();
        let mut replacements = Vec::new();
        let mut broken_links = Vec::new();

        for caps in self.pattern.captures_iter(body) {
            let Some(whole) = caps.get(0).map(|m| m.as_str()) else {
                continue;
            };
            if !seen.insert(whole) {
                continue;
            }
            let target = caps.get(1).map_or("", |m| m.as_str());
            let suffix = caps.get(2).map_or("", |m| m.as_str());

            match self.resolve_target(repo, doc_path, target) {
                Some(permalink) => {
                    debug!(%key, %target, %permalink, "Rewriting link");
                    replacements.push((whole, format!("href=\"{permalink}{suffix}\"")));
                },
                None => {
                    warn!(%key, link = %target, "Broken link: no tracked route for target");
                    broken_links.push(target.to_string());
                },
            }
        }

        let mut rewritten_body = body.to_string();
        for (from, to) in &replacements {
            rewritten_body = rewritten_body.replace(from, to);
        }

        RewriteOutcome {
            body: rewritten_body,
            rewritten: replacements.len(),
            broken_links,
        }
    }

    fn resolve_target(&self, repo: &str, doc_path: &str, target: &str) -> Option<&str> {
        match Url::parse(target) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => self.table.lookup_url(target),
            Ok(_) => None,
            Err(_) => {
                let path = resolve_relative(doc_path, target)?;
                self.table.lookup(repo, &path)
            },
        }
    }
}

/// Resolve `target` against the directory of `doc_path`.
///
/// A leading `/` is relative to the repository root. Returns `None` when the
/// link climbs above the root.
pub fn resolve_relative(doc_path: &str, target: &str) -> Option<String> {
    let mut segments: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        let mut base: Vec<&str> = doc_path.split('/').filter(|s| !s.is_empty()).collect();
        base.pop();
        base
    };

    for part in target.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                segments.pop()?;
            },
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}
