//! Reason codes for audit events
//!
//! Structured codes for categorizing why a dispatch failed or why a
//! conflict occurred. Used as the `code` of failed audit results.

use std::fmt;

use serde::{Deserialize, Serialize};

use tidesync_core::domain::ConflictType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The remote store could not be reached
    RemoteUnavailable,
    /// The remote store refused the mutation
    RemoteRejected,
    /// The item used up its retry budget
    RetriesExhausted,
    /// A stored payload could not be decompressed in time or at all
    DecompressionFailed,
    /// Both sides modified the entity
    ConcurrentUpdate,
    /// One side deleted what the other updated
    DeleteVsUpdate,
    /// The durable store rejected a write
    PersistenceFailure,
}

impl ReasonCode {
    /// Uppercase form used in audit result codes
    pub fn as_code(self) -> &'static str {
        match self {
            ReasonCode::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            ReasonCode::RemoteRejected => "REMOTE_REJECTED",
            ReasonCode::RetriesExhausted => "RETRIES_EXHAUSTED",
            ReasonCode::DecompressionFailed => "DECOMPRESSION_FAILED",
            ReasonCode::ConcurrentUpdate => "CONCURRENT_UPDATE",
            ReasonCode::DeleteVsUpdate => "DELETE_VS_UPDATE",
            ReasonCode::PersistenceFailure => "PERSISTENCE_FAILURE",
        }
    }
}

impl From<ConflictType> for ReasonCode {
    fn from(conflict_type: ConflictType) -> Self {
        match conflict_type {
            ConflictType::ConcurrentUpdate => ReasonCode::ConcurrentUpdate,
            ConflictType::DeleteVsUpdate => ReasonCode::DeleteVsUpdate,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::RemoteUnavailable => "remote_unavailable",
            ReasonCode::RemoteRejected => "remote_rejected",
            ReasonCode::RetriesExhausted => "retries_exhausted",
            ReasonCode::DecompressionFailed => "decompression_failed",
            ReasonCode::ConcurrentUpdate => "concurrent_update",
            ReasonCode::DeleteVsUpdate => "delete_vs_update",
            ReasonCode::PersistenceFailure => "persistence_failure",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_display() {
        assert_eq!(ReasonCode::RetriesExhausted.to_string(), "retries_exhausted");
        assert_eq!(ReasonCode::RetriesExhausted.as_code(), "RETRIES_EXHAUSTED");
    }

    #[test]
    fn reason_code_serialization() {
        let json = serde_json::to_string(&ReasonCode::DecompressionFailed).unwrap();
        assert_eq!(json, "\"decompression_failed\"");
        let code: ReasonCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, ReasonCode::DecompressionFailed);
    }

    #[test]
    fn reason_code_from_conflict_type() {
        assert_eq!(
            ReasonCode::from(ConflictType::DeleteVsUpdate),
            ReasonCode::DeleteVsUpdate
        );
    }
}
