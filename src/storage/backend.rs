//! Uptime store trait definition
//!
//! This module defines the core `UptimeStore` trait that all
//! history implementations must implement.

use async_trait::async_trait;
use chrono::Utc;

use super::error::StorageResult;
use super::schema::{HistoryPoint, UptimeWindow};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Current wall-clock time in whole unix seconds
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Durable, hour-bucketed liveness history
///
/// Every operation comes in two forms: the `_at` form takes the current time
/// explicitly (unix seconds), the plain form reads the wall clock. Backends
/// only implement the `_at` forms.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` and safe to call concurrently for
/// different hosts. `record_status_at` must be atomic per `(host, bucket)`.
#[async_trait]
pub trait UptimeStore: Send + Sync {
    /// Upsert the observation for the bucket containing `now`
    ///
    /// A second call for the same host within the same hour replaces the
    /// first (last write wins).
    async fn record_status_at(&self, host: &str, is_up: bool, now: i64) -> StorageResult<()>;

    /// Records with `bucket >= now - window_hours * 3600`, oldest first
    ///
    /// Returns an empty list when there is no data.
    async fn get_history_at(
        &self,
        host: &str,
        window_hours: u32,
        now: i64,
    ) -> StorageResult<Vec<HistoryPoint>>;

    /// Delete records with `bucket < now - retention_days * 86400`
    ///
    /// Returns the number of records deleted.
    async fn prune_at(&self, retention_days: u32, now: i64) -> StorageResult<u64>;

    /// Check backend health
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable stats about the backend
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;

    async fn render_window_at(
        &self,
        host: &str,
        window_hours: u32,
        now: i64,
    ) -> StorageResult<UptimeWindow> {
        let history = self.get_history_at(host, window_hours, now).await?;
        Ok(UptimeWindow::render(&history, window_hours, now))
    }

    async fn record_status(&self, host: &str, is_up: bool) -> StorageResult<()> {
        self.record_status_at(host, is_up, unix_now()).await
    }

    async fn get_history(&self, host: &str, window_hours: u32) -> StorageResult<Vec<HistoryPoint>> {
        self.get_history_at(host, window_hours, unix_now()).await
    }

    async fn render_window(&self, host: &str, window_hours: u32) -> StorageResult<UptimeWindow> {
        self.render_window_at(host, window_hours, unix_now()).await
    }

    async fn prune(&self, retention_days: u32) -> StorageResult<u64> {
        self.prune_at(retention_days, unix_now()).await
    }
}
