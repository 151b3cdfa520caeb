//! TideSync Cache - Durable queue persistence
//!
//! One SQLite file holds everything the engine must not lose across a
//! restart:
//!
//! | table            | content                                       |
//! |------------------|-----------------------------------------------|
//! | `queue_snapshot` | single row: schema version + queued items     |
//! | `quarantine`     | newest 100 quarantined items                  |
//! | `conflicts`      | every conflict until cleared                  |
//! | `audit_log`      | audit events written through `IAuditSink`     |
//!
//! [`SqliteQueueStore`] implements both `IQueueStore` and `IAuditSink`.
//! [`MemoryQueueStore`] keeps the same data in process memory.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use tidesync_cache::{DatabasePool, SqliteQueueStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/tidesync/queue.db")).await?;
//! let store = SqliteQueueStore::new(pool.pool().clone());
//! let _ = store;
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod pool;
pub mod repository;

pub use memory::MemoryQueueStore;
pub use pool::DatabasePool;
pub use repository::SqliteQueueStore;

/// Failures opening or reading the queue database
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cannot create database directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot open queue database at {path}: {source}")]
    Open { path: String, source: sqlx::Error },

    #[error("schema migration failed: {0}")]
    Migration(#[source] sqlx::Error),

    #[error(transparent)]
    Query(#[from] sqlx::Error),

    /// A stored row no longer decodes into its domain type
    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Corrupt(e.to_string())
    }
}
