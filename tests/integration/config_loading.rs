//! Integration tests for loading a hosts file into monitors
//!
//! These tests verify that:
//! - Invalid host entries are dropped while the rest load
//! - Sections left out of the file fall back to their defaults
//! - The local machine is added unless it is already configured

use std::io::Write;
use std::path::PathBuf;

use assert_matches::assert_matches;
use fleetwatch::config::{HostKind, SshAuth, StorageConfig, read_config_file};
use fleetwatch::monitors::build_monitors;
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_invalid_entries_are_dropped() {
    let file = write_config(
        r#"{
            "hosts": [
                {"name": "web-1", "ip": "10.0.0.5", "ssh_user": "ops", "ssh_key_path": "/keys/id_ed25519"},
                {"name": "web-2", "ip": "10.0.0.6", "ssh_user": "ops"},
                {"name": "web-1", "ip": "10.0.0.7", "ssh_user": "ops", "ssh_password": "hunter2"},
                {"ip": "10.0.0.8", "ssh_user": "ops", "ssh_password": "hunter2"},
                "not an object",
                {"name": "db", "address": "10.0.0.9", "ssh_port": 2222, "ssh_user": "root", "ssh_password": "hunter2"}
            ]
        }"#,
    );

    let config = read_config_file(file.path()).unwrap();

    let names: Vec<_> = config.hosts.iter().map(|host| host.name.as_str()).collect();
    assert_eq!(names, vec!["web-1", "db"]);

    assert_matches!(&config.hosts[0].kind, HostKind::Remote(access) => {
        assert_eq!(access.port, 22);
        assert_eq!(access.auth, SshAuth::Key(PathBuf::from("/keys/id_ed25519")));
    });
    assert_matches!(&config.hosts[1].kind, HostKind::Remote(access) => {
        assert_eq!(access.port, 2222);
        assert_eq!(access.auth, SshAuth::Password("hunter2".to_string()));
    });
}

#[test]
fn test_missing_sections_use_defaults() {
    let file = write_config(r#"{"hosts": []}"#);

    let config = read_config_file(file.path()).unwrap();

    assert_eq!(config.monitor.refresh_interval_secs, 60);
    assert_eq!(config.monitor.liveness_interval_secs, 3600);
    assert_eq!(config.monitor.retention_days, 7);
    assert_eq!(config.monitor.history_hours, 48);
    assert_matches!(config.storage, StorageConfig::Sqlite { .. });
    assert_eq!(config.discord.anchors_file, PathBuf::from("message_ids.json"));
    assert!(config.api.enabled);
}

#[test]
fn test_unreadable_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();

    let result = read_config_file(dir.path().join("missing.json"));

    assert!(result.is_err());
}

#[test]
fn test_malformed_file_is_an_error() {
    let file = write_config("{ hosts: ");

    assert!(read_config_file(file.path()).is_err());
}

#[tokio::test]
async fn test_monitors_follow_config_order() {
    let file = write_config(
        r#"{
            "hosts": [
                {"name": "web-1", "ip": "10.0.0.5", "ssh_user": "ops", "ssh_password": "x"},
                {"name": "db", "ip": "10.0.0.6", "ssh_user": "ops", "ssh_password": "x"}
            ],
            "monitor": {"include_local": false}
        }"#,
    );
    let config = read_config_file(file.path()).unwrap();

    let monitors = build_monitors(&config.hosts, &config.monitor);

    let names: Vec<_> = monitors
        .iter()
        .map(|monitor| monitor.identity().name.clone())
        .collect();
    assert_eq!(names, vec!["web-1", "db"]);
}

#[tokio::test]
async fn test_local_machine_is_added_first() {
    let file = write_config(
        r#"{"hosts": [{"name": "web-1", "ip": "10.0.0.5", "ssh_user": "ops", "ssh_password": "x"}]}"#,
    );
    let config = read_config_file(file.path()).unwrap();

    let monitors = build_monitors(&config.hosts, &config.monitor);

    assert_eq!(monitors.len(), 2);
    assert!(monitors[0].identity().name.ends_with("(localhost)"));
    assert_eq!(monitors[1].identity().name, "web-1");
}

#[tokio::test]
async fn test_configured_localhost_is_not_duplicated() {
    let file = write_config(r#"{"hosts": [{"name": "self", "ip": "127.0.0.1"}]}"#);
    let config = read_config_file(file.path()).unwrap();

    let monitors = build_monitors(&config.hosts, &config.monitor);

    assert_eq!(monitors.len(), 1);
    assert_eq!(monitors[0].identity().name, "self");
}
