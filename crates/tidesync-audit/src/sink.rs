//! Log-only audit sink
//!
//! Writes every audit event as a structured `tracing` event under the
//! `tidesync::audit` target. Used when no durable audit store is wired.

use async_trait::async_trait;
use tracing::{info, warn};

use tidesync_core::domain::{AuditEvent, AuditResult};
use tidesync_core::ports::IAuditSink;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IAuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let item_id = event.item_id().map(|id| id.to_string());
        match event.result() {
            AuditResult::Success => info!(
                target: "tidesync::audit",
                action = %event.action(),
                item_id = ?item_id,
                duration_ms = ?event.duration_ms(),
                details = %event.details(),
                "audit"
            ),
            AuditResult::Failed { code, message } => warn!(
                target: "tidesync::audit",
                action = %event.action(),
                item_id = ?item_id,
                code = %code,
                message = %message,
                details = %event.details(),
                "audit"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tidesync_core::domain::AuditAction;

    use super::*;

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        let sink = TracingAuditSink::new();
        sink.record(&AuditEvent::new(AuditAction::SyncStart, AuditResult::success()))
            .await
            .unwrap();
        sink.record(&AuditEvent::new(
            AuditAction::Error,
            AuditResult::failed("PERSISTENCE_FAILURE", "disk full"),
        ))
        .await
        .unwrap();
    }
}
