//! Uptime history storage
//!
//! ## Design
//!
//! - **Trait-based**: `UptimeStore` allows swapping implementations
//! - **Async**: All operations are async for use from the scheduler tasks
//! - **Hour buckets**: One record per host and hour, upserted
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database
//! - **In-Memory**: No persistence, for `storage.backend = "none"` and tests
//!
//! ## Usage
//!
//! ```no_run
//! use fleetwatch::storage::{UptimeStore, sqlite::SqliteUptimeStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteUptimeStore::new("./uptime_history.db").await?;
//!     store.record_status("web-1", true).await?;
//!     println!("{}", store.render_window("web-1", 48).await?);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::UptimeStore;
pub use error::{StorageError, StorageResult};
pub use schema::{HistoryPoint, UptimeSymbol, UptimeWindow, hour_bucket};
