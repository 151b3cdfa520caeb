//! Audit sink port
//!
//! Receives sync events (cycle boundaries, dispatches, quarantines and
//! conflict changes). Callers go through `tidesync-audit::AuditLogger`,
//! which logs and swallows sink failures so that auditing never
//! interrupts synchronization.

use async_trait::async_trait;

use crate::domain::AuditEvent;

#[async_trait]
pub trait IAuditSink: Send + Sync {
    /// Records a single audit event
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()>;
}
