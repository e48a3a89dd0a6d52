//! Integration tests for the HTTP API
//!
//! These tests verify that:
//! - Hosts are listed in configuration order with their cached state
//! - Status requests are served from the cache unless a refresh is asked for
//! - Uptime windows are validated and rendered from the store
//! - Unknown hosts answer 404

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fleetwatch::api::{ApiState, spawn_api_server};
use fleetwatch::cache::StatusCache;
use fleetwatch::storage::UptimeStore;
use fleetwatch::storage::backend::unix_now;
use fleetwatch::storage::memory::MemoryUptimeStore;
use fleetwatch::storage::schema::HOUR;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::Value;

use crate::helpers::{FakeMonitor, as_monitors, fleet};

struct TestApi {
    addr: SocketAddr,
    fakes: Vec<Arc<FakeMonitor>>,
    store: Arc<MemoryUptimeStore>,
    client: reqwest::Client,
}

impl TestApi {
    async fn start() -> Self {
        let fakes = fleet(&["web", "db"]);
        fakes[1].set_online(false);
        let monitors = as_monitors(&fakes);
        let identities = monitors
            .iter()
            .map(|monitor| monitor.identity().clone())
            .collect();
        let store = Arc::new(MemoryUptimeStore::new());

        let state = ApiState::new(
            identities,
            Arc::new(StatusCache::new(&monitors)),
            store.clone(),
            Duration::from_secs(60),
            48,
        );
        let addr = spawn_api_server("127.0.0.1:0".parse().unwrap(), state)
            .await
            .unwrap();

        Self {
            addr,
            fakes,
            store,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(format!("http://{}{path}", self.addr))
            .send()
            .await
            .unwrap();
        let status = response.status();
        let body = response.json().await.unwrap();
        (status, body)
    }
}

#[tokio::test]
async fn test_health_check() {
    let api = TestApi::start().await;

    let (status, body) = api.get("/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage_healthy"], true);
    assert!(
        body["storage_stats"]
            .as_str()
            .unwrap()
            .starts_with("In-Memory: 0 records")
    );
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_hosts_before_first_probe_are_unknown() {
    let api = TestApi::start().await;

    let (status, body) = api.get("/api/v1/hosts").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["hosts"][0]["name"], "web");
    assert_eq!(body["hosts"][0]["status"], "unknown");
    assert_eq!(body["hosts"][1]["name"], "db");
}

#[tokio::test]
async fn test_status_is_cached_until_refresh() {
    let api = TestApi::start().await;

    let (status, body) = api.get("/api/v1/hosts/web/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["state"], "online");
    assert_eq!(body["host"]["address"], "10.0.0.1");

    api.get("/api/v1/hosts/web/status").await;
    assert_eq!(api.fakes[0].fetches(), 1);

    api.get("/api/v1/hosts/web/status?refresh=true").await;
    assert_eq!(api.fakes[0].fetches(), 2);

    let (_, body) = api.get("/api/v1/hosts").await;
    assert_eq!(body["hosts"][0]["status"], "online");
}

#[tokio::test]
async fn test_offline_status_carries_diagnostic() {
    let api = TestApi::start().await;

    let (status, body) = api.get("/api/v1/hosts/db/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["state"], "offline");
    assert_eq!(body["outcome"]["diagnostic"], "Connection timed out");
}

#[tokio::test]
async fn test_unknown_host_is_not_found() {
    let api = TestApi::start().await;

    let (status, body) = api.get("/api/v1/hosts/mail/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("mail"));

    let (status, _) = api.get("/api/v1/hosts/mail/uptime").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_uptime_without_history_is_no_data() {
    let api = TestApi::start().await;

    let (status, body) = api.get("/api/v1/hosts/web/uptime").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hours"], 48);
    assert_eq!(body["no_data"], true);
    assert_eq!(body["symbols"].as_array().unwrap().len(), 0);
    assert!(body.get("emoji").is_none());
}

#[tokio::test]
async fn test_uptime_window_from_history() {
    let api = TestApi::start().await;
    let now = unix_now();
    api.store.record_status_at("web", true, now - HOUR).await.unwrap();
    api.store.record_status_at("web", false, now).await.unwrap();

    let (status, body) = api.get("/api/v1/hosts/web/uptime?hours=3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["no_data"], false);
    assert_eq!(
        body["symbols"],
        serde_json::json!(["unknown", "up", "down"])
    );
    assert_eq!(body["uptime_percentage"], 50.0);
    assert_eq!(body["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_uptime_hours_out_of_range() {
    let api = TestApi::start().await;

    let (status, _) = api.get("/api/v1/hosts/web/uptime?hours=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = api.get("/api/v1/hosts/web/uptime?hours=169").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("168"));
}
