//! Durable queue store port (driven/secondary port)
//!
//! Persists the sync queue, the bounded quarantine list and the conflict
//! list so that pending work and conflict gating survive restarts.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - The queue is always written as a full [`QueueSnapshot`]; there is no
//!   per-item update API.
//! - `load_queue` returns `Ok(None)` when nothing has been persisted yet.
//!   Implementations that find an unreadable record should log it and
//!   return `Ok(None)` rather than fail startup.

use async_trait::async_trait;

use crate::domain::{QuarantineRecord, QueueSnapshot, SyncConflict};

#[async_trait]
pub trait IQueueStore: Send + Sync {
    /// Replaces the persisted queue with `snapshot`
    async fn save_queue(&self, snapshot: &QueueSnapshot) -> anyhow::Result<()>;

    /// Loads the persisted queue, if any
    async fn load_queue(&self) -> anyhow::Result<Option<QueueSnapshot>>;

    /// Appends a quarantine record, keeping only the most recent entries
    async fn push_quarantine(&self, record: &QuarantineRecord) -> anyhow::Result<()>;

    /// Loads quarantine records, most recent first
    async fn load_quarantine(&self) -> anyhow::Result<Vec<QuarantineRecord>>;

    /// Inserts or replaces a conflict
    async fn save_conflict(&self, conflict: &SyncConflict) -> anyhow::Result<()>;

    /// Loads every stored conflict, oldest first
    async fn load_conflicts(&self) -> anyhow::Result<Vec<SyncConflict>>;

    /// Deletes resolved conflicts and returns how many were removed
    async fn delete_resolved_conflicts(&self) -> anyhow::Result<u64>;
}
