//! AuditLogger - high-level audit logging service
//!
//! Wraps `IAuditSink::record()` with convenience methods for each kind of
//! auditable sync event. All methods are non-fatal: sink errors are logged
//! via `tracing::warn!` but never propagated.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use tidesync_core::domain::{
    AuditAction, AuditEvent, AuditResult, SyncConflict, SyncQueueItem,
};
use tidesync_core::ports::IAuditSink;

use crate::reason::ReasonCode;

/// High-level audit logger over an audit sink
///
/// All methods silently swallow errors (logging a warning) so that audit
/// failures never break synchronization.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn IAuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn IAuditSink>) -> Self {
        Self { sink }
    }

    async fn save(&self, event: &AuditEvent) {
        if let Err(e) = self.sink.record(event).await {
            tracing::warn!(error = %e, action = %event.action(), "Failed to record audit event");
        }
    }

    fn item_details(item: &SyncQueueItem) -> serde_json::Value {
        json!({
            "entity": item.entity().as_str(),
            "operation": item.operation().to_string(),
            "priority": item.priority().level(),
            "retry_count": item.retry_count(),
        })
    }

    // ========================================================================
    // Cycle lifecycle
    // ========================================================================

    pub async fn log_sync_start(&self, batch_size: usize) {
        let event = AuditEvent::new(AuditAction::SyncStart, AuditResult::success())
            .with_details(json!({ "batch_size": batch_size }));
        self.save(&event).await;
    }

    /// Log the end of a dispatch cycle with its per-outcome counts.
    pub async fn log_sync_complete(
        &self,
        duration: Duration,
        dispatched: usize,
        retried: usize,
        quarantined: usize,
        conflicted: usize,
    ) {
        let event = AuditEvent::new(AuditAction::SyncComplete, AuditResult::success())
            .with_duration_ms(duration.as_millis() as u64)
            .with_details(json!({
                "dispatched": dispatched,
                "retried": retried,
                "quarantined": quarantined,
                "conflicted": conflicted,
            }));
        self.save(&event).await;
    }

    // ========================================================================
    // Item outcomes
    // ========================================================================

    pub async fn log_item_dispatched(&self, item: &SyncQueueItem, duration: Duration) {
        let event = AuditEvent::new(AuditAction::ItemDispatched, AuditResult::success())
            .with_item_id(*item.id())
            .with_duration_ms(duration.as_millis() as u64)
            .with_details(Self::item_details(item));
        self.save(&event).await;
    }

    pub async fn log_retry_scheduled(&self, item: &SyncQueueItem, delay: Duration, error: &str) {
        let mut details = Self::item_details(item);
        details["delay_ms"] = json!(delay.as_millis() as u64);
        let event = AuditEvent::new(
            AuditAction::RetryScheduled,
            AuditResult::failed(ReasonCode::RemoteRejected.as_code(), error),
        )
        .with_item_id(*item.id())
        .with_details(details);
        self.save(&event).await;
    }

    pub async fn log_item_quarantined(&self, item: &SyncQueueItem, reason: &str) {
        let event = AuditEvent::new(
            AuditAction::ItemQuarantined,
            AuditResult::failed(ReasonCode::RetriesExhausted.as_code(), reason),
        )
        .with_item_id(*item.id())
        .with_details(Self::item_details(item));
        self.save(&event).await;
    }

    // ========================================================================
    // Conflicts
    // ========================================================================

    pub async fn log_conflict_detected(&self, conflict: &SyncConflict) {
        let code = ReasonCode::from(conflict.conflict_type());
        let event = AuditEvent::new(
            AuditAction::ConflictDetected,
            AuditResult::failed(code.as_code(), format!("{} on {}", code, conflict.entity())),
        )
        .with_item_id(*conflict.item_id())
        .with_details(json!({
            "conflict_id": conflict.id().to_string(),
            "entity": conflict.entity().as_str(),
            "conflict_type": conflict.conflict_type().to_string(),
            "local_marker": conflict.local_marker().to_rfc3339(),
            "remote_marker": conflict.remote_marker().map(|m| m.to_rfc3339()),
        }));
        self.save(&event).await;
    }

    pub async fn log_conflict_resolved(&self, conflict: &SyncConflict) {
        let event = AuditEvent::new(AuditAction::ConflictResolved, AuditResult::success())
            .with_item_id(*conflict.item_id())
            .with_details(json!({
                "conflict_id": conflict.id().to_string(),
                "entity": conflict.entity().as_str(),
                "strategy": conflict.resolution().map(|s| s.name()),
                "resolved_by": conflict.resolved_by().map(|s| s.to_string()),
            }));
        self.save(&event).await;
    }

    // ========================================================================
    // Errors
    // ========================================================================

    pub async fn log_error(&self, code: ReasonCode, message: &str, context: Option<&str>) {
        let mut event = AuditEvent::new(
            AuditAction::Error,
            AuditResult::failed(code.as_code(), message),
        );
        if let Some(ctx) = context {
            event = event.with_details(json!({ "context": ctx }));
        }
        self.save(&event).await;
    }
}
