//! Integration tests for the Discord status flow
//!
//! These tests verify that:
//! - A refresh cycle posts one embed per host and records the message ids
//! - Later cycles edit the recorded messages instead of posting new ones
//! - Anchors written by one run are picked up by the next
//! - A rejected token stops the scheduler before any job runs

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use fleetwatch::anchors::AnchorStore;
use fleetwatch::cache::StatusCache;
use fleetwatch::config::MonitorConfig;
use fleetwatch::discord::{DiscordClient, DiscordPresenter};
use fleetwatch::presenter::{ArtifactHandle, PresentationError};
use fleetwatch::scheduler::{Scheduler, SchedulerSettings};
use fleetwatch::storage::memory::MemoryUptimeStore;
use serde_json::{Value, json};
use tempfile::tempdir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{FakeMonitor, as_monitors, fleet};

fn discord_scheduler(
    server: &MockServer,
    fakes: &[Arc<FakeMonitor>],
    anchors: Arc<AnchorStore>,
) -> Arc<Scheduler> {
    let monitors = as_monitors(fakes);
    let presenter = DiscordPresenter::new(DiscordClient::new(&server.uri(), "token", "42"), 48);

    Arc::new(Scheduler::new(
        monitors.clone(),
        Arc::new(StatusCache::new(&monitors)),
        Arc::new(MemoryUptimeStore::new()),
        Arc::new(presenter),
        anchors,
        SchedulerSettings::from(&MonitorConfig {
            spread_secs: 0.0,
            ..Default::default()
        }),
    ))
}

async fn mount_create(server: &MockServer, ids: &[&str]) {
    for id in ids {
        Mock::given(method("POST"))
            .and(path("/channels/42/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": id})))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

async fn posted_titles(server: &MockServer) -> Vec<String> {
    let mut titles: Vec<String> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method.as_str() == "POST")
        .filter_map(|request| {
            let body: Value = serde_json::from_slice(&request.body).ok()?;
            body["embeds"][0]["title"].as_str().map(str::to_string)
        })
        .collect();
    titles.sort();
    titles
}

#[tokio::test]
async fn test_first_cycle_posts_and_records_ids() {
    let server = MockServer::start().await;
    mount_create(&server, &["1001", "1002"]).await;
    let dir = tempdir().unwrap();
    let anchors = Arc::new(AnchorStore::empty(dir.path().join("message_ids.json")));
    let fakes = fleet(&["web", "db"]);
    fakes[1].set_online(false);

    let report = discord_scheduler(&server, &fakes, anchors.clone())
        .refresh_cycle()
        .await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(posted_titles(&server).await, vec!["🔴 db", "🟢 web"]);

    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(anchors.path()).unwrap()).unwrap();
    let mut ids: Vec<_> = saved
        .as_object()
        .unwrap()
        .values()
        .map(|id| id.as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["1001", "1002"]);
}

#[tokio::test]
async fn test_second_cycle_edits_in_place() {
    let server = MockServer::start().await;
    mount_create(&server, &["1001"]).await;
    Mock::given(method("PATCH"))
        .and(path("/channels/42/messages/1001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1001"})))
        .expect(2)
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let anchors = Arc::new(AnchorStore::empty(dir.path().join("message_ids.json")));
    let scheduler = discord_scheduler(&server, &fleet(&["web"]), anchors.clone());

    scheduler.refresh_cycle().await;
    scheduler.refresh_cycle().await;
    scheduler.refresh_cycle().await;

    assert_eq!(posted_titles(&server).await.len(), 1);
    assert_eq!(
        anchors.get("web").await,
        Some(ArtifactHandle("1001".to_string()))
    );
}

#[tokio::test]
async fn test_saved_anchors_are_reused_after_restart() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/channels/42/messages/777"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "777"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let anchors_file = dir.path().join("message_ids.json");
    std::fs::write(&anchors_file, r#"{"web": 777, "retired-host": "555"}"#).unwrap();

    let anchors = Arc::new(AnchorStore::load(&anchors_file, ["web"]));
    let report = discord_scheduler(&server, &fleet(&["web"]), anchors.clone())
        .refresh_cycle()
        .await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(anchors.snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_failed_post_fails_only_that_host() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path_regex(r"^/channels/42/messages/\d+$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_create(&server, &["1001", "1002"]).await;
    let dir = tempdir().unwrap();
    let anchors = Arc::new(AnchorStore::empty(dir.path().join("message_ids.json")));
    anchors.set("db", ArtifactHandle("900".to_string())).await;

    let report = discord_scheduler(&server, &fleet(&["web", "db"]), anchors.clone())
        .refresh_cycle()
        .await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed_hosts, vec!["db".to_string()]);
    assert_eq!(
        anchors.get("db").await,
        Some(ArtifactHandle("900".to_string()))
    );
}

#[tokio::test]
async fn test_rejected_token_stops_the_scheduler() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "401: Unauthorized"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let anchors = Arc::new(AnchorStore::empty(dir.path().join("message_ids.json")));
    let scheduler = discord_scheduler(&server, &fleet(&["web"]), anchors);

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        scheduler.run(std::future::pending()),
    )
    .await
    .unwrap();

    assert_matches!(result, Err(PresentationError::Fatal(_)));
}
