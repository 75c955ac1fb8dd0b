//! Configuration for the ingestion pipeline.
//!
//! Configuration is a single TOML file holding the remote service settings,
//! the refresh schedule and the static route table. It is loaded once at
//! process start, validated, and then treated as read-only.
//!
//! ## File Location
//!
//! 1. An explicit path passed by the caller (`refdocs --config <path>`)
//! 2. The `REFDOCS_CONFIG` environment variable
//! 3. `refdocs.toml` in the platform config directory
//!
//! ## Example
//!
//! ```rust
//! use refdocs_core::Config;
//!
//! let config = Config::from_toml_str(r#"
//!     [refresh]
//!     interval_secs = 600
//!
//!     [routes.quick-start]
//!     permalink = "/quick-start.html"
//!     repo = "yahoo/fluxible"
//!     path = "docs/quick-start.md"
//!     title = "Quick Start"
//! "#)?;
//! config.validate()?;
//! assert_eq!(config.tracked_routes().len(), 1);
//! # Ok::<(), refdocs_core::Error>(())
//! ```

use crate::{Error, Result, TrackedRoute};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "REFDOCS_CONFIG";
/// Environment variable overriding the source-host access token.
pub const TOKEN_ENV: &str = "REFDOCS_GITHUB_TOKEN";
/// Environment variable overriding the source-host client id.
pub const CLIENT_ID_ENV: &str = "REFDOCS_GITHUB_CLIENT_ID";
/// Environment variable overriding the source-host client secret.
pub const CLIENT_SECRET_ENV: &str = "REFDOCS_GITHUB_CLIENT_SECRET";
/// Environment variable overriding the snapshot location.
pub const SNAPSHOT_ENV: &str = "REFDOCS_SNAPSHOT_PATH";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source-control host settings.
    #[serde(default)]
    pub source_host: SourceHostConfig,
    /// Package registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Refresh schedule.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Route table keyed by route identifier.
    #[serde(default)]
    pub routes: BTreeMap<String, RouteConfig>,
}

/// Contents/branches API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHostConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Personal access token, preferred over client credentials.
    #[serde(default)]
    pub token: Option<String>,
    /// OAuth application client id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth application client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceHostConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: None,
            client_id: None,
            client_secret: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Package registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry base URL; package documents live at `<base_url>/<name>`.
    #[serde(default = "default_registry_url")]
    pub base_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_url(),
        }
    }
}

/// Refresh schedule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Delay between the end of one cycle and the start of the next.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Ref used when no branch matches the published version.
    #[serde(default = "default_ref")]
    pub default_ref: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            default_ref: default_ref(),
        }
    }
}

impl RefreshConfig {
    /// Interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Snapshot file; defaults to `snapshot.json` in the platform data directory.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

/// One `[routes.<id>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Site-relative path, must start with `/`.
    pub permalink: String,
    /// Upstream repository, `owner/name`.
    #[serde(default)]
    pub repo: Option<String>,
    /// Markdown file path inside the repository.
    #[serde(default)]
    pub path: Option<String>,
    /// Explicit ref override.
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    /// Registry package name when it differs from the repository name.
    #[serde(default)]
    pub package: Option<String>,
    /// Page title.
    pub title: String,
    /// Page description.
    #[serde(default)]
    pub description: String,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_registry_url() -> String {
    "https://registry.npmjs.org".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_interval_secs() -> u64 {
    60 * 60
}

fn default_ref() -> String {
    "master".to_string()
}

impl Config {
    /// Load configuration from `REFDOCS_CONFIG` or the default location.
    ///
    /// Environment overrides are applied after parsing. Unlike a missing
    /// optional setting, a missing file is an error: a site without routes
    /// has nothing to serve.
    pub fn load() -> Result<Self> {
        let path = match std::env::var(CONFIG_ENV) {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
            _ => Self::default_config_path()?,
        };
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path and apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from TOML text without touching the environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Default configuration file path in the platform config directory.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("refdocs.toml"))
    }

    /// Apply `REFDOCS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("REFDOCS_"))
            .collect();
        self.apply_overrides(|key| vars.get(key).cloned());
    }

    /// Apply overrides from an arbitrary lookup; blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(token) = get(TOKEN_ENV) {
            self.source_host.token = Some(token);
        }
        if let Some(id) = get(CLIENT_ID_ENV) {
            self.source_host.client_id = Some(id);
        }
        if let Some(secret) = get(CLIENT_SECRET_ENV) {
            self.source_host.client_secret = Some(secret);
        }
        if let Some(snapshot) = get(SNAPSHOT_ENV) {
            self.paths.snapshot = Some(PathBuf::from(snapshot));
        }
    }

    /// Check the route table and settings for contract violations.
    ///
    /// Called once at startup; any error here is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.refresh.interval_secs == 0 {
            return Err(Error::Config(
                "refresh.interval_secs must be greater than zero".into(),
            ));
        }
        if self.refresh.default_ref.trim().is_empty() {
            return Err(Error::Config("refresh.default_ref must not be empty".into()));
        }
        if self.source_host.client_id.is_some() != self.source_host.client_secret.is_some() {
            return Err(Error::Config(
                "source_host.client_id and source_host.client_secret must be set together".into(),
            ));
        }

        let mut permalinks: HashMap<&str, &str> = HashMap::new();
        for (id, route) in &self.routes {
            if id.trim().is_empty() {
                return Err(Error::Config("route identifier must not be empty".into()));
            }
            if !route.permalink.starts_with('/') {
                return Err(Error::Config(format!(
                    "route '{id}': permalink '{}' must start with '/'",
                    route.permalink
                )));
            }
            if let Some(other) = permalinks.insert(route.permalink.as_str(), id.as_str()) {
                return Err(Error::Config(format!(
                    "routes '{other}' and '{id}' share permalink '{}'",
                    route.permalink
                )));
            }
            if let Some(path) = &route.path {
                if route.repo.as_deref().is_none_or(|r| r.trim().is_empty()) {
                    return Err(Error::Config(format!(
                        "route '{id}': path is set but repo is missing"
                    )));
                }
                if !path.ends_with(".md") {
                    return Err(Error::Config(format!(
                        "route '{id}': path '{path}' is not a markdown file"
                    )));
                }
            }
            if let Some(repo) = &route.repo {
                if repo.split('/').filter(|s| !s.is_empty()).count() != 2 {
                    return Err(Error::Config(format!(
                        "route '{id}': repo '{repo}' must look like 'owner/name'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Route table as [`TrackedRoute`] values, in route identifier order.
    pub fn tracked_routes(&self) -> Vec<TrackedRoute> {
        self.routes
            .iter()
            .map(|(id, route)| TrackedRoute {
                id: id.clone(),
                permalink: route.permalink.clone(),
                repo: route.repo.clone(),
                path: route.path.as_deref().map(|p| p.trim_start_matches('/').to_string()),
                explicit_ref: route.git_ref.clone(),
                package: route.package.clone(),
                resolved_ref: None,
                title: route.title.clone(),
                description: route.description.clone(),
            })
            .collect()
    }

    /// Resolved snapshot path.
    pub fn snapshot_path(&self) -> Result<PathBuf> {
        match &self.paths.snapshot {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("snapshot.json")),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("io", "refdocs", "refdocs")
        .ok_or_else(|| Error::Config("Failed to determine platform directories".into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [source_host]
        token = "file-token"

        [refresh]
        interval_secs = 120

        [routes.home]
        permalink = "/"
        title = "Home"

        [routes.quick-start]
        permalink = "/quick-start.html"
        repo = "yahoo/fluxible"
        path = "docs/quick-start.md"
        title = "Quick Start"
        description = "Getting started"

        [routes.api-actions]
        permalink = "/api/actions.html"
        repo = "yahoo/fluxible"
        path = "/docs/api/Actions.md"
        ref = "gh-pages"
        title = "Actions"
    "#;

    #[test]
    fn test_parse_applies_defaults() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.source_host.api_base, "https://api.github.com");
        assert_eq!(config.source_host.timeout_secs, 30);
        assert_eq!(config.registry.base_url, "https://registry.npmjs.org");
        assert_eq!(config.refresh.interval(), Duration::from_secs(120));
        assert_eq!(config.refresh.default_ref, "master");
        assert_eq!(config.routes.len(), 3);
    }

    #[test]
    fn test_default_interval_is_one_hour() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.refresh.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_tracked_routes_are_ordered_and_normalized() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let routes = config.tracked_routes();
        let ids: Vec<&str> = routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["api-actions", "home", "quick-start"]);

        let actions = &routes[0];
        assert_eq!(actions.path.as_deref(), Some("docs/api/Actions.md"));
        assert_eq!(actions.explicit_ref.as_deref(), Some("gh-pages"));
        assert!(!routes[1].is_content());
    }

    #[test]
    fn test_validate_accepts_sample() {
        Config::from_toml_str(SAMPLE).unwrap().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicate_permalink() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        let mut dup = config.routes["quick-start"].clone();
        dup.path = Some("docs/other.md".to_string());
        config.routes.insert("other".to_string(), dup);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("/quick-start.html"));
    }

    #[test]
    fn test_validate_rejects_bad_routes() {
        let cases = [
            r#"[routes.a]
               permalink = "no-slash"
               title = "A""#,
            r#"[routes.a]
               permalink = "/a"
               path = "docs/a.md"
               title = "A""#,
            r#"[routes.a]
               permalink = "/a"
               repo = "yahoo/fluxible"
               path = "docs/a.txt"
               title = "A""#,
            r#"[routes.a]
               permalink = "/a"
               repo = "fluxible"
               path = "docs/a.md"
               title = "A""#,
            r#"[refresh]
               interval_secs = 0"#,
            r#"[source_host]
               client_id = "only-id""#,
        ];

        for case in cases {
            let config = Config::from_toml_str(case).unwrap();
            assert!(config.validate().is_err(), "expected rejection for {case}");
        }
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = [
            (TOKEN_ENV, "env-token"),
            (SNAPSHOT_ENV, "/tmp/refdocs/snap.json"),
            (CLIENT_ID_ENV, "   "),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.source_host.token.as_deref(), Some("env-token"));
        assert_eq!(config.source_host.client_id, None);
        assert_eq!(
            config.snapshot_path().unwrap(),
            PathBuf::from("/tmp/refdocs/snap.json")
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.routes.len(), 3);
    }

    #[test]
    fn test_load_from_missing_file_is_config_error() {
        let err = Config::load_from(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
