//! SQLite implementation of IQueueStore and IAuditSink
//!
//! ## Type Mapping
//!
//! | Domain Type       | SQL Type | Strategy                                    |
//! |-------------------|----------|---------------------------------------------|
//! | QueueSnapshot     | TEXT     | single row, items as a serde_json array     |
//! | QuarantineRecord  | TEXT     | serde_json, one row per record              |
//! | SyncConflict      | TEXT     | serde_json plus indexed id/resolved columns |
//! | DateTime<Utc>     | TEXT     | RFC 3339 via `to_rfc3339()`                 |
//! | AuditAction       | TEXT     | `as_str` name, parsed back with `FromStr`   |
//! | AuditResult       | TEXT     | serde_json serialization                    |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use tidesync_core::domain::{
    AuditAction, AuditEvent, AuditResult, DomainError, QuarantineRecord, QueueSnapshot,
    SyncConflict, SyncQueueItem, QUARANTINE_CAPACITY,
};
use tidesync_core::ports::{IAuditSink, IQueueStore};

use crate::CacheError;

/// SQLite-backed durable queue store
///
/// Also serves as a persistent audit sink, writing to the `audit_log`
/// table of the same database.
#[derive(Clone)]
pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    /// Creates a new store on top of an already migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the most recent audit rows, newest first
    ///
    /// Rows whose action or result cannot be decoded are skipped.
    pub async fn recent_audit(&self, limit: u32) -> anyhow::Result<Vec<AuditEvent>> {
        let rows = sqlx::query("SELECT * FROM audit_log ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            match audit_event_from_row(row) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable audit row"),
            }
        }
        Ok(events)
    }
}

// ============================================================================
// Row helpers
// ============================================================================

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::Corrupt(format!("Invalid datetime '{}': {}", s, e)))
}

fn audit_action_from_string(s: &str) -> Result<AuditAction, CacheError> {
    s.parse().map_err(|e: DomainError| CacheError::Corrupt(e.to_string()))
}

fn audit_event_from_row(row: &SqliteRow) -> Result<AuditEvent, CacheError> {
    let action_str: String = row.try_get("action")?;
    let result_str: String = row.try_get("result")?;
    let details_str: Option<String> = row.try_get("details")?;
    let item_id: Option<String> = row.try_get("item_id")?;
    let duration_ms: Option<i64> = row.try_get("duration_ms")?;

    let action = audit_action_from_string(&action_str)?;
    let result: AuditResult = serde_json::from_str(&result_str)?;

    let mut event = AuditEvent::new(action, result);
    if let Some(details) = details_str {
        event = event.with_details(serde_json::from_str(&details)?);
    }
    if let Some(id) = item_id {
        let id = id
            .parse()
            .map_err(|e| CacheError::Corrupt(format!("Invalid item id: {}", e)))?;
        event = event.with_item_id(id);
    }
    if let Some(ms) = duration_ms {
        event = event.with_duration_ms(ms as u64);
    }
    Ok(event)
}

fn decode_snapshot(schema_version: i64, items_json: &str) -> Result<QueueSnapshot, CacheError> {
    let items: Vec<SyncQueueItem> = serde_json::from_str(items_json)?;
    Ok(QueueSnapshot {
        schema_version: u32::try_from(schema_version).map_err(|_| {
            CacheError::Corrupt(format!("Invalid schema version {}", schema_version))
        })?,
        items,
    })
}

// ============================================================================
// IQueueStore
// ============================================================================

#[async_trait]
impl IQueueStore for SqliteQueueStore {
    async fn save_queue(&self, snapshot: &QueueSnapshot) -> anyhow::Result<()> {
        let items = serde_json::to_string(&snapshot.items)
            .map_err(|e| anyhow::anyhow!("Failed to serialize queue items: {}", e))?;

        sqlx::query(
            "INSERT INTO queue_snapshot (id, schema_version, items, saved_at) \
             VALUES (1, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             schema_version = excluded.schema_version, \
             items = excluded.items, \
             saved_at = excluded.saved_at",
        )
        .bind(snapshot.schema_version as i64)
        .bind(&items)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(items = snapshot.items.len(), "Saved queue snapshot");
        Ok(())
    }

    async fn load_queue(&self) -> anyhow::Result<Option<QueueSnapshot>> {
        let row = sqlx::query("SELECT schema_version, items FROM queue_snapshot WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let schema_version: i64 = row.try_get("schema_version")?;
        let items: String = row.try_get("items")?;

        match decode_snapshot(schema_version, &items) {
            Ok(snapshot) if snapshot.is_supported() => Ok(Some(snapshot)),
            Ok(snapshot) => {
                tracing::warn!(
                    schema_version = snapshot.schema_version,
                    "Ignoring queue snapshot written by an unsupported schema"
                );
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring corrupt queue snapshot");
                Ok(None)
            }
        }
    }

    async fn push_quarantine(&self, record: &QuarantineRecord) -> anyhow::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| anyhow::anyhow!("Failed to serialize quarantine record: {}", e))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quarantine (item_id, reason, record, quarantined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(record.item.id().to_string())
        .bind(&record.reason)
        .bind(&json)
        .bind(record.quarantined_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let pruned = sqlx::query(
            "DELETE FROM quarantine WHERE id NOT IN \
             (SELECT id FROM quarantine ORDER BY id DESC LIMIT ?)",
        )
        .bind(QUARANTINE_CAPACITY as i64)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::debug!(item_id = %record.item.id(), pruned, "Quarantine record stored");
        Ok(())
    }

    async fn load_quarantine(&self) -> anyhow::Result<Vec<QuarantineRecord>> {
        let rows = sqlx::query("SELECT record FROM quarantine ORDER BY id DESC LIMIT ?")
            .bind(QUARANTINE_CAPACITY as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let json: String = row.try_get("record")?;
            match serde_json::from_str::<QuarantineRecord>(&json) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "Skipping corrupt quarantine record"),
            }
        }
        Ok(records)
    }

    async fn save_conflict(&self, conflict: &SyncConflict) -> anyhow::Result<()> {
        let json = serde_json::to_string(conflict)
            .map_err(|e| anyhow::anyhow!("Failed to serialize conflict: {}", e))?;

        sqlx::query(
            "INSERT INTO conflicts (id, item_id, entity, resolved, detected_at, record) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             resolved = excluded.resolved, \
             record = excluded.record",
        )
        .bind(conflict.id().to_string())
        .bind(conflict.item_id().to_string())
        .bind(conflict.entity().as_str())
        .bind(conflict.is_resolved())
        .bind(conflict.detected_at().to_rfc3339())
        .bind(&json)
        .execute(&self.pool)
        .await?;

        tracing::trace!(conflict_id = %conflict.id(), "Saved conflict");
        Ok(())
    }

    async fn load_conflicts(&self) -> anyhow::Result<Vec<SyncConflict>> {
        let rows = sqlx::query("SELECT record, detected_at FROM conflicts ORDER BY detected_at ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut conflicts = Vec::with_capacity(rows.len());
        for row in &rows {
            let json: String = row.try_get("record")?;
            match serde_json::from_str::<SyncConflict>(&json) {
                Ok(conflict) => conflicts.push(conflict),
                Err(e) => {
                    let detected_at: String = row.try_get("detected_at")?;
                    tracing::warn!(
                        error = %e,
                        detected_at = ?parse_datetime(&detected_at).ok(),
                        "Skipping corrupt conflict record"
                    );
                }
            }
        }
        Ok(conflicts)
    }

    async fn delete_resolved_conflicts(&self) -> anyhow::Result<u64> {
        let deleted = sqlx::query("DELETE FROM conflicts WHERE resolved = 1")
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!(deleted, "Deleted resolved conflicts");
        Ok(deleted)
    }
}

// ============================================================================
// IAuditSink
// ============================================================================

#[async_trait]
impl IAuditSink for SqliteQueueStore {
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let action = event.action().to_string();
        let result = serde_json::to_string(event.result())
            .map_err(|e| anyhow::anyhow!("Failed to serialize audit result: {}", e))?;
        let details = serde_json::to_string(event.details())
            .map_err(|e| anyhow::anyhow!("Failed to serialize audit details: {}", e))?;

        sqlx::query(
            "INSERT INTO audit_log (timestamp, item_id, action, result, details, duration_ms) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event.timestamp().to_rfc3339())
        .bind(event.item_id().map(|id| id.to_string()))
        .bind(&action)
        .bind(&result)
        .bind(&details)
        .bind(event.duration_ms().map(|d| d as i64))
        .execute(&self.pool)
        .await?;

        tracing::trace!(action = %action, "Saved audit event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_action_names_parse_back() {
        for action in AuditAction::ALL {
            assert_eq!(audit_action_from_string(action.as_str()).unwrap(), action);
        }
        assert!(matches!(
            audit_action_from_string("exploded"),
            Err(CacheError::Corrupt(_))
        ));
    }

    #[test]
    fn test_decode_snapshot_rejects_garbage() {
        assert!(decode_snapshot(1, "{not json").is_err());
        assert!(decode_snapshot(-1, "[]").is_err());
        assert!(decode_snapshot(1, "[]").unwrap().items.is_empty());
    }

    #[test]
    fn test_parse_datetime() {
        assert!(parse_datetime("2026-10-19T08:00:00+00:00").is_ok());
        assert!(parse_datetime("yesterday").is_err());
    }
}
