//! SQLite uptime store
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers do not block the hourly upserts
//! - **Atomic upserts**: `ON CONFLICT (hostname, hour_bucket) DO UPDATE`
//! - **Migrations**: Automatic schema versioning with sqlx

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, UptimeStore, unix_now};
use super::error::{StorageError, StorageResult};
use super::schema::{HistoryPoint, hour_bucket, retention_cutoff, window_start};

/// SQLite-backed uptime history
pub struct SqliteUptimeStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteUptimeStore {
    /// Open (or create) the database and run migrations
    ///
    /// ```no_run
    /// # use fleetwatch::storage::sqlite::SqliteUptimeStore;
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = SqliteUptimeStore::new("./uptime_history.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite uptime store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30)); // Retry on lock contention

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Open {
                path: db_path_str.clone(),
                reason: e.to_string(),
            })?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }
}

#[async_trait]
impl UptimeStore for SqliteUptimeStore {
    #[instrument(skip(self))]
    async fn record_status_at(&self, host: &str, is_up: bool, now: i64) -> StorageResult<()> {
        let bucket = hour_bucket(now);

        sqlx::query(
            r#"
            INSERT INTO uptime_history (hostname, hour_bucket, status, recorded_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (hostname, hour_bucket) DO UPDATE SET
                status = excluded.status,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(host)
        .bind(bucket)
        .bind(is_up)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StorageError::query("record status"))?;

        debug!("recorded {host} as {} for bucket {bucket}", if is_up { "up" } else { "down" });
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_history_at(
        &self,
        host: &str,
        window_hours: u32,
        now: i64,
    ) -> StorageResult<Vec<HistoryPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT hour_bucket, status
            FROM uptime_history
            WHERE hostname = ? AND hour_bucket >= ?
            ORDER BY hour_bucket ASC
            "#,
        )
        .bind(host)
        .bind(window_start(now, window_hours))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::query("load history"))?;

        let history: Vec<HistoryPoint> = rows
            .into_iter()
            .map(|row| HistoryPoint {
                hour_bucket: row.get("hour_bucket"),
                is_up: row.get::<i64, _>("status") != 0,
            })
            .collect();

        debug!("history query returned {} records", history.len());
        Ok(history)
    }

    #[instrument(skip(self))]
    async fn prune_at(&self, retention_days: u32, now: i64) -> StorageResult<u64> {
        let cutoff = retention_cutoff(now, retention_days);

        let result = sqlx::query("DELETE FROM uptime_history WHERE hour_bucket < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(StorageError::query("prune history"))?;

        let deleted = result.rows_affected();
        debug!("deleted {deleted} records older than {cutoff}");
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (total_rows, hosts): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT hostname) FROM uptime_history")
                .fetch_one(&self.pool)
                .await
                .map_err(StorageError::query("collect stats"))?;

        let oldest: (Option<i64>,) = sqlx::query_as("SELECT MIN(hour_bucket) FROM uptime_history")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::query("collect stats"))?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        let span = match oldest.0 {
            Some(oldest) => format!("{}h of history", (unix_now() - oldest).max(0) / 3600),
            None => "no data".to_string(),
        };

        Ok(format!(
            "SQLite: {} records for {} hosts, {:.2} MB on disk, {}",
            total_rows,
            hosts,
            file_size as f64 / 1_000_000.0,
            span
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite uptime store");
        self.pool.close().await;
        Ok(())
    }
}
