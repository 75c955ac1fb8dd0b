//! End-to-end ingestion cycles against mocked registry and source host.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use base64::{Engine, engine::general_purpose::STANDARD};
use refdocs_core::{Config, DocumentStore, Pipeline, ReadService};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACTIONS_MD: &str = "# Actions\n\nActions are dispatched with a payload. See [Stores](Stores.md#events) and [Plugins](Plugins.md).\n";

fn config(server: &MockServer, snapshot: &std::path::Path) -> Config {
    let toml = format!(
        r#"
        [source_host]
        api_base = "{base}"
        token = "test-token"
        timeout_secs = 5

        [registry]
        base_url = "{base}"

        [refresh]
        interval_secs = 3600
        default_ref = "master"

        [paths]
        snapshot = "{snapshot}"

        [routes.actions]
        permalink = "/api/actions.html"
        repo = "yahoo/fluxible"
        path = "docs/api/Actions.md"
        title = "Actions"
        description = "Dispatching payloads"

        [routes.stores]
        permalink = "/api/stores.html"
        repo = "yahoo/fluxible"
        path = "docs/api/Stores.md"
        title = "Stores"
        description = "Holding state"

        [routes.home]
        permalink = "/"
        title = "Home"
        "#,
        base = server.uri(),
        snapshot = snapshot.display(),
    );
    let config = Config::from_toml_str(&toml).unwrap();
    config.validate().unwrap();
    config
}

async fn mount_registry(server: &MockServer, latest: &str) {
    Mock::given(method("GET"))
        .and(path("/fluxible"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "dist-tags": { "latest": latest } })),
        )
        .mount(server)
        .await;
}

async fn mount_branches(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/yahoo/fluxible/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "v1.x" },
            { "name": "v2.x" },
            { "name": "master" }
        ])))
        .mount(server)
        .await;
}

async fn mount_contents(server: &MockServer, git_ref: &str) {
    Mock::given(method("GET"))
        .and(path("/repos/yahoo/fluxible/contents/docs/api/Actions.md"))
        .and(query_param("ref", git_ref))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "content": STANDARD.encode(ACTIONS_MD), "encoding": "base64" })),
        )
        .mount(server)
        .await;

    // A body without `content` means the file is absent at that ref.
    Mock::given(method("GET"))
        .and(path("/repos/yahoo/fluxible/contents/docs/api/Stores.md"))
        .and(query_param("ref", git_ref))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Not Found" })))
        .mount(server)
        .await;
}

async fn upstream(latest: &str, git_ref: &str) -> MockServer {
    let server = MockServer::start().await;
    mount_registry(&server, latest).await;
    mount_branches(&server).await;
    mount_contents(&server, git_ref).await;
    server
}

#[tokio::test]
async fn cycle_resolves_fetches_rewrites_and_persists() {
    let server = upstream("2.3.0", "v2.x").await;
    let dir = TempDir::new().unwrap();
    let config = config(&server, &dir.path().join("snapshot.json"));
    let store = Arc::new(DocumentStore::new());
    let mut pipeline = Pipeline::from_config(&config, Arc::clone(&store)).unwrap();

    let report = pipeline.run_cycle().await.unwrap();

    assert_eq!(report.refs.get("yahoo/fluxible"), Some("v2.x"));
    assert!(report.fallbacks.is_empty());
    assert_eq!(report.documents, 2);
    assert_eq!(report.fetched, 1);
    assert_eq!(report.stubbed, 1);
    assert!(report.failed.is_empty());
    assert!(report.persisted);

    let actions = store.get("/api/actions.html").unwrap();
    assert!(actions.body.contains(r#"href="/api/stores.html#events""#));
    assert!(!actions.body.contains("Stores.md"));
    assert!(actions.body.contains(r#"href="Plugins.md""#));
    assert_eq!(actions.git_ref.as_deref(), Some("v2.x"));

    let stores = store.get("/api/stores.html").unwrap();
    assert_eq!(stores.body, "Doc Not Found: docs/api/Stores.md");
    assert!(stores.stub);

    assert_eq!(report.broken_links.len(), 1);
    assert_eq!(report.broken_links[0].key, "/api/actions.html");
    assert_eq!(report.broken_links[0].target, "Plugins.md");

    let hits = store.search("actions", 10).unwrap();
    assert_eq!(hits[0].key, "/api/actions.html");
    assert!(dir.path().join("snapshot.json").exists());
}

#[tokio::test]
async fn repeated_cycles_are_idempotent() {
    let server = upstream("2.3.0", "v2.x").await;
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("snapshot.json");
    let config = config(&server, &snapshot);
    let store = Arc::new(DocumentStore::new());
    let mut pipeline = Pipeline::from_config(&config, Arc::clone(&store)).unwrap();

    pipeline.run_cycle().await.unwrap();
    let first = std::fs::read(&snapshot).unwrap();
    pipeline.run_cycle().await.unwrap();
    let second = std::fs::read(&snapshot).unwrap();

    assert_eq!(first, second);
    assert_eq!(store.len(), 2);
    assert_eq!(store.index().unwrap().len(), 2);

    let raw: serde_json::Value = serde_json::from_slice(&second).unwrap();
    assert_eq!(raw["docs"].as_array().unwrap().len(), 2);
    assert_eq!(raw["index"]["entries"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn registry_failure_falls_back_to_default_ref() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fluxible"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_branches(&server).await;
    mount_contents(&server, "master").await;

    let dir = TempDir::new().unwrap();
    let config = config(&server, &dir.path().join("snapshot.json"));
    let store = Arc::new(DocumentStore::new());
    let mut pipeline = Pipeline::from_config(&config, Arc::clone(&store)).unwrap();

    let report = pipeline.run_cycle().await.unwrap();

    assert_eq!(report.refs.get("yahoo/fluxible"), Some("master"));
    assert_eq!(report.fallbacks, vec!["yahoo/fluxible".to_string()]);
    assert_eq!(report.fetched, 1);
}

#[tokio::test]
async fn cached_reads_do_not_touch_the_network() {
    let server = upstream("2.3.0", "v2.x").await;
    let dir = TempDir::new().unwrap();
    let config = config(&server, &dir.path().join("snapshot.json"));
    let store = Arc::new(DocumentStore::new());
    let mut pipeline = Pipeline::from_config(&config, Arc::clone(&store)).unwrap();
    pipeline.run_cycle().await.unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let reads = ReadService::new(Arc::clone(&store), &config.tracked_routes(), tx);
    let before = server.received_requests().await.unwrap().len();

    for _ in 0..10 {
        let result = reads.read("/api/actions.html").unwrap();
        assert!(!result.is_pending());
    }

    assert_eq!(server.received_requests().await.unwrap().len(), before);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn snapshot_warms_a_fresh_store() {
    let server = upstream("2.3.0", "v2.x").await;
    let dir = TempDir::new().unwrap();
    let config = config(&server, &dir.path().join("snapshot.json"));
    let mut pipeline = Pipeline::from_config(&config, Arc::new(DocumentStore::new())).unwrap();
    pipeline.run_cycle().await.unwrap();

    let fresh = Arc::new(DocumentStore::new());
    let restarted = Pipeline::from_config(&config, Arc::clone(&fresh)).unwrap();
    let before = server.received_requests().await.unwrap().len();

    assert!(restarted.warm_start());
    assert_eq!(fresh.len(), 2);
    assert_eq!(fresh.search("dispatched", 5).unwrap()[0].key, "/api/actions.html");
    assert_eq!(server.received_requests().await.unwrap().len(), before);
}
