//! SQLite pool setup for the queue database

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::CacheError;

const SCHEMA: &str = include_str!("migrations/20261019_initial.sql");

/// Connections held by a file-backed pool
const FILE_POOL_SIZE: u32 = 4;

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Migrated SQLite pool
///
/// File databases run in WAL mode. The in-memory variant is capped at one
/// connection since every connection to `:memory:` sees its own database.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens or creates the database file at `db_path` and applies the schema
    ///
    /// # Errors
    ///
    /// [`CacheError::CreateDir`], [`CacheError::Open`] or
    /// [`CacheError::Migration`].
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| CacheError::CreateDir {
                path: dir.display().to_string(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_POOL_SIZE)
            .connect_with(options)
            .await
            .map_err(|source| CacheError::Open {
                path: db_path.display().to_string(),
                source,
            })?;

        let db = Self::migrated(pool).await?;
        info!(path = %db_path.display(), "Queue database ready");
        Ok(db)
    }

    /// Private in-memory database, gone when the pool closes
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|source| CacheError::Open {
                path: ":memory:".to_string(),
                source,
            })?;

        Self::migrated(pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Every statement in the schema is `IF NOT EXISTS`
    async fn migrated(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(CacheError::Migration)?;
        debug!("Queue schema applied");
        Ok(Self { pool })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_has_schema() {
        let db = DatabasePool::in_memory().await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();

        for table in ["audit_log", "conflicts", "quarantine", "queue_snapshot"] {
            assert!(names.contains(&table), "missing table {table}: {names:?}");
        }
        db.close().await;
    }
}
