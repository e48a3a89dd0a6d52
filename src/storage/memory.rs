//! In-memory uptime store (no persistence)
//!
//! Used when storage is configured as `none`, and as a fake in tests.
//! History is lost on restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, UptimeStore};
use super::error::StorageResult;
use super::schema::{HistoryPoint, hour_bucket, retention_cutoff, window_start};

/// In-memory uptime store
///
/// Buckets are kept per host in a `BTreeMap`, so history queries come out
/// ordered without sorting.
#[derive(Debug, Default)]
pub struct MemoryUptimeStore {
    records: RwLock<HashMap<String, BTreeMap<i64, bool>>>,
}

impl MemoryUptimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all hosts
    pub async fn len(&self) -> usize {
        self.records.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UptimeStore for MemoryUptimeStore {
    async fn record_status_at(&self, host: &str, is_up: bool, now: i64) -> StorageResult<()> {
        let mut records = self.records.write().await;
        records
            .entry(host.to_string())
            .or_default()
            .insert(hour_bucket(now), is_up);
        Ok(())
    }

    async fn get_history_at(
        &self,
        host: &str,
        window_hours: u32,
        now: i64,
    ) -> StorageResult<Vec<HistoryPoint>> {
        let records = self.records.read().await;
        let history = records
            .get(host)
            .map(|buckets| {
                buckets
                    .range(window_start(now, window_hours)..)
                    .map(|(bucket, is_up)| HistoryPoint {
                        hour_bucket: *bucket,
                        is_up: *is_up,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(history)
    }

    async fn prune_at(&self, retention_days: u32, now: i64) -> StorageResult<u64> {
        let cutoff = retention_cutoff(now, retention_days);
        let mut records = self.records.write().await;

        let mut deleted = 0;
        for buckets in records.values_mut() {
            let kept = buckets.split_off(&cutoff);
            deleted += buckets.len() as u64;
            *buckets = kept;
        }
        records.retain(|_, buckets| !buckets.is_empty());

        debug!("in-memory prune deleted {deleted} records");
        Ok(deleted)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("total_records".to_string(), self.len().await.to_string()),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let hosts = self.records.read().await.len();
        Ok(format!(
            "In-Memory: {} records for {} hosts",
            self.len().await,
            hosts
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
