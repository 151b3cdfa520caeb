//! Audit trail records
//!
//! One [`AuditEvent`] per notable step of the engine: cycle start and end,
//! each dispatch outcome, quarantines and the conflict lifecycle.

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::QueueItemId;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SyncStart,
    SyncComplete,
    ItemDispatched,
    /// A failed item went back to the queue with a backoff deadline
    RetryScheduled,
    ItemQuarantined,
    ConflictDetected,
    ConflictResolved,
    Error,
}

impl AuditAction {
    pub const ALL: [AuditAction; 8] = [
        AuditAction::SyncStart,
        AuditAction::SyncComplete,
        AuditAction::ItemDispatched,
        AuditAction::RetryScheduled,
        AuditAction::ItemQuarantined,
        AuditAction::ConflictDetected,
        AuditAction::ConflictResolved,
        AuditAction::Error,
    ];

    /// Stable snake_case name, identical to the serde form
    pub const fn as_str(self) -> &'static str {
        match self {
            AuditAction::SyncStart => "sync_start",
            AuditAction::SyncComplete => "sync_complete",
            AuditAction::ItemDispatched => "item_dispatched",
            AuditAction::RetryScheduled => "retry_scheduled",
            AuditAction::ItemQuarantined => "item_quarantined",
            AuditAction::ConflictDetected => "conflict_detected",
            AuditAction::ConflictResolved => "conflict_resolved",
            AuditAction::Error => "error",
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown audit action '{s}'")))
    }
}

/// Outcome attached to an event; failures carry a machine code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failed { code: String, message: String },
}

impl AuditResult {
    pub fn success() -> Self {
        AuditResult::Success
    }

    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        AuditResult::Failed {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AuditResult::Success)
    }

    pub fn is_failed(&self) -> bool {
        !self.is_success()
    }

    /// The failure code, `None` on success
    pub fn code(&self) -> Option<&str> {
        match self {
            AuditResult::Success => None,
            AuditResult::Failed { code, .. } => Some(code),
        }
    }
}

/// An entry in the audit trail
///
/// Built with [`AuditEvent::new`] and the `with_*` methods:
///
/// ```
/// use tidesync_core::domain::audit::{AuditAction, AuditEvent, AuditResult};
///
/// let event = AuditEvent::new(AuditAction::SyncStart, AuditResult::success())
///     .with_duration_ms(12);
/// assert!(event.result().is_success());
/// assert!(event.item_id().is_none());
/// assert_eq!(event.duration_ms(), Some(12));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    timestamp: DateTime<Utc>,
    item_id: Option<QueueItemId>,
    action: AuditAction,
    result: AuditResult,
    /// Free-form context such as entity, operation or retry count
    details: Value,
    duration_ms: Option<u64>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, result: AuditResult) -> Self {
        Self {
            timestamp: Utc::now(),
            item_id: None,
            action,
            result,
            details: Value::Null,
            duration_ms: None,
        }
    }

    pub fn with_item_id(self, item_id: QueueItemId) -> Self {
        Self {
            item_id: Some(item_id),
            ..self
        }
    }

    pub fn with_details(self, details: Value) -> Self {
        Self { details, ..self }
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            ..self
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn item_id(&self) -> Option<&QueueItemId> {
        self.item_id.as_ref()
    }

    pub fn action(&self) -> &AuditAction {
        &self.action
    }

    pub fn result(&self) -> &AuditResult {
        &self.result
    }

    pub fn details(&self) -> &Value {
        &self.details
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }
}
