use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One configured document to ingest.
///
/// Built from the `[routes.<id>]` tables of the configuration file. Routes
/// without an upstream `path` are non-content routes: they own a permalink
/// but are skipped by the ingestion cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRoute {
    /// Stable route identifier (the config table key).
    pub id: String,
    /// Site-relative path the document is served under.
    pub permalink: String,
    /// Upstream repository identifier, `owner/name`.
    pub repo: Option<String>,
    /// Upstream file path inside the repository.
    pub path: Option<String>,
    /// Explicit ref that bypasses published-version resolution.
    pub explicit_ref: Option<String>,
    /// Package name used for the registry lookup.
    pub package: Option<String>,
    /// Ref chosen for the current cycle.
    pub resolved_ref: Option<String>,
    /// Document title.
    pub title: String,
    /// Short document description.
    pub description: String,
}

impl TrackedRoute {
    /// Whether the route points at upstream content.
    pub const fn is_content(&self) -> bool {
        self.repo.is_some() && self.path.is_some()
    }

    /// Package name for registry lookups, defaulting to the repository name segment.
    pub fn package_name(&self) -> Option<&str> {
        self.package.as_deref().or_else(|| {
            self.repo
                .as_deref()
                .and_then(|repo| repo.rsplit('/').next())
                .filter(|name| !name.is_empty())
        })
    }

    /// Ref to fetch with: explicit override first, then the resolved ref.
    pub fn effective_ref(&self) -> Option<&str> {
        self.explicit_ref
            .as_deref()
            .or(self.resolved_ref.as_deref())
    }
}

/// Ref resolved for each upstream repository in a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedRefs {
    refs: BTreeMap<String, String>,
}

impl ResolvedRefs {
    /// Record the ref for a repository, replacing any previous value.
    pub fn insert(&mut self, repo: impl Into<String>, git_ref: impl Into<String>) {
        self.refs.insert(repo.into(), git_ref.into());
    }

    /// Ref for a repository if one was resolved.
    pub fn get(&self, repo: &str) -> Option<&str> {
        self.refs.get(repo).map(String::as_str)
    }

    /// Number of repositories with a resolved ref.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Whether no refs were resolved.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Iterate `(repo, ref)` pairs in repository order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.refs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A fetched, rendered and link-rewritten document.
///
/// Exactly one exists per content route per cycle. A newer document with the
/// same key replaces its predecessor wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Lookup key; equal to the route permalink.
    pub key: String,
    /// Rendered, link-rewritten body.
    pub body: String,
    /// Document title.
    pub title: String,
    /// Document description.
    pub description: String,
    /// Site-relative permalink.
    pub permalink: String,
    /// Upstream repository the body came from.
    pub repo: String,
    /// Upstream file path the body came from.
    pub path: String,
    /// Ref the body was fetched at, if any.
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    /// True when the body is the not-found placeholder.
    #[serde(default)]
    pub stub: bool,
}

impl Document {
    /// Placeholder body used when the contents API has no data for a path.
    pub fn not_found_body(path: &str) -> String {
        format!("Doc Not Found: {path}")
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document key.
    pub key: String,
    /// Document title.
    pub title: String,
    /// Document permalink.
    pub permalink: String,
    /// Excerpt around the first match in the body.
    pub snippet: String,
    /// Relevance score.
    pub score: f32,
}
