//! Status read model
//!
//! [`SyncStatus`] is an aggregated snapshot recomputed by the engine after
//! every state change. It is not owned data: observers receive copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the worker loop currently is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    /// Waiting for the next tick or trigger
    Idle,
    /// Verifying that the engine is enabled and online
    CheckingConnectivity,
    /// Pulling the next batch out of the queue
    DrainingBatch,
    /// Sending batch items to the remote store
    Dispatching,
}

impl Default for WorkerPhase {
    fn default() -> Self {
        WorkerPhase::Idle
    }
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerPhase::Idle => "idle",
            WorkerPhase::CheckingConnectivity => "checking_connectivity",
            WorkerPhase::DrainingBatch => "draining_batch",
            WorkerPhase::Dispatching => "dispatching",
        };
        write!(f, "{}", s)
    }
}

/// Accumulated sync counters
///
/// `total_syncs`, `successful_syncs` and `failed_syncs` count individual
/// dispatch attempts. `average_sync_time_ms` is the mean duration of
/// completed cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetrics {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    /// Uncompressed payload bytes delivered to the remote store
    pub data_transferred: u64,
    /// Mean compression ratio over all compressed payloads (0 when none)
    pub compression_ratio: f64,
    pub average_sync_time_ms: f64,
}

/// Read-only snapshot published to observers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Whether the timer loop is running
    pub is_active: bool,
    pub is_online: bool,
    pub queue_size: usize,
    pub sync_in_progress: bool,
    pub phase: WorkerPhase,
    pub last_sync: Option<DateTime<Utc>>,
    pub next_sync: Option<DateTime<Utc>>,
    pub quarantine_count: usize,
    pub unresolved_conflicts: usize,
    /// True while the durable store is failing and the queue lives in memory only
    pub persistence_degraded: bool,
    pub metrics: SyncMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_idle_and_empty() {
        let status = SyncStatus::default();
        assert!(!status.is_active);
        assert!(!status.sync_in_progress);
        assert_eq!(status.phase, WorkerPhase::Idle);
        assert_eq!(status.queue_size, 0);
        assert_eq!(status.metrics, SyncMetrics::default());
    }

    #[test]
    fn test_worker_phase_display() {
        assert_eq!(WorkerPhase::DrainingBatch.to_string(), "draining_batch");
        assert_eq!(
            serde_json::to_string(&WorkerPhase::CheckingConnectivity).unwrap(),
            "\"checking_connectivity\""
        );
    }
}
