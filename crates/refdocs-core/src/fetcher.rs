//! Source host client for file contents and branch listings.
//!
//! Contents arrive base64-encoded. A 404 or a body without `content` is a
//! missing file, which the pipeline turns into a stub document.

use crate::config::SourceHostConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Remote repository host: file contents and branch listings.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Fetch and decode a file at `path` in `repo`, optionally at `git_ref`.
    ///
    /// A missing file is [`FetchedContent::NotFound`], not an error.
    async fn fetch_contents(
        &self,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FetchedContent>;

    /// List branch names of `repo` in the order the host returns them,
    /// across every page of the listing.
    async fn list_branches(&self, repo: &str) -> Result<Vec<String>>;
}

/// Outcome of a contents request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedContent {
    /// Decoded file content.
    Found(String),
    /// The host answered but has no content for the path.
    NotFound,
}

/// How requests authenticate against the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Personal access token sent in the `Authorization` header.
    Token(String),
    /// OAuth application credentials sent as query parameters.
    Client {
        /// Client id.
        id: String,
        /// Client secret.
        secret: String,
    },
    /// Unauthenticated, subject to the host's lowest rate limit.
    Anonymous,
}

impl Credentials {
    /// Pick credentials from configuration, preferring the token.
    pub fn from_config(config: &SourceHostConfig) -> Self {
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            return Self::Token(token.to_string());
        }
        match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) => Self::Client {
                id: id.clone(),
                secret: secret.clone(),
            },
            _ => Self::Anonymous,
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Token(token) => request.header(AUTHORIZATION, format!("token {token}")),
            Self::Client { id, secret } => {
                request.query(&[("client_id", id.as_str()), ("client_secret", secret.as_str())])
            },
            Self::Anonymous => request,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchEntry {
    name: String,
}

/// HTTP client for a GitHub-compatible contents and branches API.
pub struct GitHubClient {
    client: Client,
    api_base: String,
    credentials: Credentials,
}

impl GitHubClient {
    /// Creates a client from source-host configuration.
    pub fn from_config(config: &SourceHostConfig) -> Result<Self> {
        Self::with_timeout(
            &config.api_base,
            Credentials::from_config(config),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Creates a client with explicit credentials and request timeout.
    pub fn with_timeout(api_base: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("refdocs/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        self.credentials.apply(request)
    }
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn fetch_contents(
        &self,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FetchedContent> {
        let url = format!(
            "{}/repos/{repo}/contents/{}",
            self.api_base,
            path.trim_start_matches('/')
        );
        let mut request = self.get(&url);
        if let Some(r) = git_ref {
            request = request.query(&[("ref", r)]);
        }

        debug!(%repo, %path, git_ref = ?git_ref, "Fetching contents");
        let response = request.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            info!(%repo, %path, "Contents not found");
            return Ok(FetchedContent::NotFound);
        }
        let response = check_status(response, "contents").await?;

        // Directory listings come back as arrays; treat them like a missing file.
        let body: serde_json::Value = response.json().await?;
        let Ok(parsed) = serde_json::from_value::<ContentsResponse>(body) else {
            return Ok(FetchedContent::NotFound);
        };
        match parsed.content {
            Some(encoded) => decode_content(&encoded).map(FetchedContent::Found),
            None => Ok(FetchedContent::NotFound),
        }
    }

    async fn list_branches(&self, repo: &str) -> Result<Vec<String>> {
        let first = format!("{}/repos/{repo}/branches", self.api_base);
        let mut request = self.get(&first).query(&[("per_page", "100")]);
        let mut names = Vec::new();

        for page in 1..=MAX_BRANCH_PAGES {
            let response = check_status(request.send().await?, "branches").await?;
            let next = next_page(response.headers());

            let branches: Vec<BranchEntry> = response
                .json()
                .await
                .map_err(|e| Error::Parse(format!("Invalid branch listing for {repo}: {e}")))?;
            names.extend(branches.into_iter().map(|b| b.name));

            let Some(next) = next else {
                debug!(%repo, pages = page, count = names.len(), "Listed branches");
                return Ok(names);
            };
            request = self.get(&next);
        }

        warn!(%repo, pages = MAX_BRANCH_PAGES, count = names.len(), "Branch listing truncated");
        Ok(names)
    }
}

/// Upper bound on branch listing pages followed per repository.
const MAX_BRANCH_PAGES: usize = 20;

/// Target of the `rel="next"` entry in a `Link` header.
fn next_page(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        params
            .split(';')
            .any(|p| p.trim() == r#"rel="next""#)
            .then(|| target.trim().trim_start_matches('<').trim_end_matches('>').to_string())
    })
}

pub(crate) async fn check_status(response: Response, service: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .ok()
        .filter(|body| !body.trim().is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
    Err(Error::Upstream {
        service: service.to_string(),
        status: status.as_u16(),
        message,
    })
}

/// Decode a base64 `content` field; the host wraps it at 60 columns.
fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::Parse(format!("Invalid base64 content: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Parse(format!("Content is not UTF-8: {e}")))
}
