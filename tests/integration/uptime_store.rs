//! Integration tests for uptime history persistence
//!
//! These tests verify that:
//! - Liveness cycles write one observation per host into SQLite
//! - History survives reopening the database
//! - The liveness job prunes records beyond the retention window
//! - Rendered windows show gaps as unknown slots

use std::sync::Arc;

use fleetwatch::storage::backend::unix_now;
use fleetwatch::storage::schema::HOUR;
use fleetwatch::storage::sqlite::SqliteUptimeStore;
use fleetwatch::storage::{UptimeStore, UptimeSymbol, UptimeWindow, hour_bucket};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::{fleet, scheduler};

#[tokio::test]
async fn test_liveness_cycle_persists_observations() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteUptimeStore::new(dir.path().join("uptime.db")).await.unwrap());
    let fakes = fleet(&["web", "db"]);
    fakes[1].set_online(false);
    let (scheduler, _) = scheduler(&fakes, store.clone(), &dir.path().join("ids.json"));

    let report = scheduler.liveness_cycle().await;

    assert_eq!(report.succeeded, 2);
    let web = store.get_history("web", 48).await.unwrap();
    let db = store.get_history("db", 48).await.unwrap();
    assert_eq!(web.len(), 1);
    assert!(web[0].is_up);
    assert!(!db[0].is_up);
    assert_eq!(web[0].hour_bucket, hour_bucket(unix_now()));
}

#[tokio::test]
async fn test_repeated_checks_in_one_hour_keep_the_latest() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteUptimeStore::new(dir.path().join("uptime.db")).await.unwrap());
    let fakes = fleet(&["web"]);
    let (scheduler, _) = scheduler(&fakes, store.clone(), &dir.path().join("ids.json"));

    scheduler.liveness_cycle().await;
    fakes[0].set_online(false);
    scheduler.liveness_cycle().await;

    let history = store.get_history("web", 1).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_up);
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("uptime.db");
    let now = unix_now();

    {
        let store = SqliteUptimeStore::new(&db_path).await.unwrap();
        store.record_status_at("web", true, now - 2 * HOUR).await.unwrap();
        store.record_status_at("web", false, now).await.unwrap();
        store.close().await.unwrap();
    }

    let store = SqliteUptimeStore::new(&db_path).await.unwrap();
    let window = store.render_window_at("web", 4, now).await.unwrap();

    assert_eq!(
        window,
        UptimeWindow::Slots(vec![
            UptimeSymbol::Unknown,
            UptimeSymbol::Up,
            UptimeSymbol::Unknown,
            UptimeSymbol::Down,
        ])
    );
}

#[tokio::test]
async fn test_liveness_cycle_prunes_expired_history() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteUptimeStore::new(dir.path().join("uptime.db")).await.unwrap());
    let now = unix_now();
    store.record_status_at("web", true, now - 10 * 24 * HOUR).await.unwrap();
    store.record_status_at("web", true, now - 3 * 24 * HOUR).await.unwrap();
    let fakes = fleet(&["web"]);
    let (scheduler, _) = scheduler(&fakes, store.clone(), &dir.path().join("ids.json"));

    scheduler.liveness_cycle().await;

    let history = store.get_history("web", 24 * 30).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].hour_bucket >= now - 7 * 24 * HOUR);
}

#[tokio::test]
async fn test_unknown_host_renders_no_data() {
    let dir = tempdir().unwrap();
    let store = SqliteUptimeStore::new(dir.path().join("uptime.db")).await.unwrap();
    store.record_status("web", true).await.unwrap();

    let window = store.render_window("never-seen", 48).await.unwrap();

    assert!(window.is_empty());
    assert_eq!(window.to_emoji(), None);
}
