//! Published-version to branch resolution.
//!
//! Each tracked repository is documented at the branch whose name, read as a
//! semantic-version range, is satisfied by the package's latest published
//! version. `v2.x` covers `2.3.0`; `master` is not a range and never matches.
//! Bare versions read the npm way, so `v2.0.0` only covers `2.0.0`.

use crate::config::RegistryConfig;
use crate::fetcher::{SourceHost, check_status};
use crate::{Error, ResolvedRefs, Result, TrackedRoute};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Leading character stripped from branch names before range parsing.
pub const VERSION_PREFIX: char = 'v';

/// Package registry lookup.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Latest published version of `package`, or `None` when the registry
    /// document lacks one.
    async fn latest_version(&self, package: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct PackageDocument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: BTreeMap<String, String>,
}

/// Client for an npm-compatible registry.
pub struct NpmRegistry {
    client: Client,
    base_url: String,
}

impl NpmRegistry {
    /// Creates a registry client from configuration.
    pub fn from_config(config: &RegistryConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("refdocs/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PackageRegistry for NpmRegistry {
    async fn latest_version(&self, package: &str) -> Result<Option<String>> {
        // Scoped names keep their `@` but escape the separator.
        let url = format!("{}/{}", self.base_url, package.replace('/', "%2F"));
        let response = self.client.get(&url).send().await?;
        let response = check_status(response, "registry").await?;

        // Untrusted payload: any shape mismatch is a soft miss.
        let body: serde_json::Value = response.json().await?;
        let latest = serde_json::from_value::<PackageDocument>(body)
            .ok()
            .and_then(|doc| doc.dist_tags.get("latest").cloned());
        debug!(%package, latest = ?latest, "Registry lookup");
        Ok(latest)
    }
}

/// Strip exactly one leading version-prefix character.
pub fn normalize_branch(name: &str) -> &str {
    name.strip_prefix(VERSION_PREFIX).unwrap_or(name)
}

/// Parse a normalized branch name as a version range.
///
/// A bare version follows npm rules rather than Cargo's implicit caret:
/// `2.0.0` is exact, `2.3` means `2.3.x` and `2` means `2.x`.
pub fn branch_range(name: &str) -> Option<VersionReq> {
    let bare = name.starts_with(|c: char| c.is_ascii_digit()) && !name.contains(',');
    if bare {
        VersionReq::parse(&format!("={name}")).ok()
    } else {
        VersionReq::parse(name).ok()
    }
}

/// Pick the branch whose normalized name is a range satisfied by `version`.
///
/// Branches are evaluated in the given order and the last satisfying one
/// wins. Names that do not parse as a range are skipped.
pub fn select_branch<'a>(version: &Version, branches: &'a [String]) -> Option<&'a str> {
    let mut selected = None;
    for branch in branches {
        let Some(range) = branch_range(normalize_branch(branch)) else {
            continue;
        };
        if range.matches(version) {
            selected = Some(branch.as_str());
        }
    }
    selected
}

/// Result of resolving one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Ref to fetch from.
    pub git_ref: String,
    /// True when the default ref was used because resolution failed.
    pub fell_back: bool,
}

/// Resolves the documentation ref of each tracked repository.
pub struct RefResolver {
    registry: Arc<dyn PackageRegistry>,
    host: Arc<dyn SourceHost>,
    default_ref: String,
}

impl RefResolver {
    /// Creates a resolver that falls back to `default_ref`.
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        host: Arc<dyn SourceHost>,
        default_ref: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            host,
            default_ref: default_ref.into(),
        }
    }

    /// The configured fallback ref.
    pub fn default_ref(&self) -> &str {
        &self.default_ref
    }

    /// Resolve the ref for `package` published from `repo`.
    ///
    /// Never fails: every failure is logged and yields the default ref.
    pub async fn resolve(&self, package: &str, repo: &str) -> Resolution {
        match self.try_resolve(package, repo).await {
            Ok(Some(git_ref)) => {
                info!(%package, %repo, %git_ref, "Resolved documentation ref");
                Resolution {
                    git_ref,
                    fell_back: false,
                }
            },
            Ok(None) => {
                warn!(%package, %repo, default_ref = %self.default_ref, "No branch matches published version; using default ref");
                self.fallback()
            },
            Err(e) => {
                warn!(%package, %repo, default_ref = %self.default_ref, category = e.category(), error = %e, "Ref resolution failed; using default ref");
                self.fallback()
            },
        }
    }

    async fn try_resolve(&self, package: &str, repo: &str) -> Result<Option<String>> {
        let Some(latest) = self.registry.latest_version(package).await? else {
            return Err(Error::Parse(format!("no latest version published for {package}")));
        };
        let version = Version::parse(latest.trim())
            .map_err(|e| Error::Parse(format!("invalid published version '{latest}': {e}")))?;
        let branches = self.host.list_branches(repo).await?;
        Ok(select_branch(&version, &branches).map(str::to_string))
    }

    fn fallback(&self) -> Resolution {
        Resolution {
            git_ref: self.default_ref.clone(),
            fell_back: true,
        }
    }

    /// Resolve every distinct repository referenced by content routes, in parallel.
    ///
    /// Repositories whose routes all carry an explicit ref are skipped. The
    /// package name comes from the first route (in route order) naming the repo.
    pub async fn resolve_all(&self, routes: &[TrackedRoute]) -> (ResolvedRefs, Vec<(String, Resolution)>) {
        let mut packages: BTreeMap<&str, &str> = BTreeMap::new();
        for route in routes.iter().filter(|r| r.is_content() && r.explicit_ref.is_none()) {
            if let (Some(repo), Some(package)) = (route.repo.as_deref(), route.package_name()) {
                packages.entry(repo).or_insert(package);
            }
        }

        let resolutions = join_all(packages.into_iter().map(|(repo, package)| async move {
            (repo.to_string(), self.resolve(package, repo).await)
        }))
        .await;

        let mut refs = ResolvedRefs::default();
        for (repo, resolution) in &resolutions {
            refs.insert(repo.clone(), resolution.git_ref.clone());
        }
        (refs, resolutions)
    }
}
