//! Errors raised by the uptime store

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    /// The history database could not be opened or created
    Open { path: String, reason: String },

    /// The uptime_history schema could not be brought up to date
    Migration(String),

    /// Recording, reading or pruning history failed
    Query {
        operation: &'static str,
        reason: String,
    },
}

impl StorageError {
    /// Adapter for `map_err` that tags a database error with what was attempted.
    #[cfg(feature = "storage-sqlite")]
    pub(crate) fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |err| StorageError::Query {
            operation,
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Open { path, reason } => {
                write!(f, "failed to open uptime history at {path}: {reason}")
            }
            StorageError::Migration(reason) => {
                write!(f, "uptime history migration failed: {reason}")
            }
            StorageError::Query { operation, reason } => {
                write!(f, "failed to {operation}: {reason}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::Migration(err.to_string())
    }
}
