//! TideSync Sync - Background sync engine
//!
//! Provides:
//! - A durable, priority-ordered queue of pending mutations
//! - The worker loop that drains the queue against a remote store
//! - Retry with exponential backoff and quarantine of exhausted items
//! - Connectivity tracking that pauses and resumes dispatch
//!
//! ## Modules
//!
//! - [`engine`] - The [`SyncEngine`] and its dispatch cycle
//! - [`queue`] - Priority queue persisted through an `IQueueStore`
//! - [`backoff`] - Retry ceiling and delay computation
//! - [`connectivity`] - Online/offline state and the reachability probe
//! - [`scheduler`] - Timer and connectivity driven cycle triggers

pub mod backoff;
pub mod connectivity;
pub mod engine;
pub mod queue;
pub mod scheduler;

pub use backoff::RetryPolicy;
pub use connectivity::ConnectivityMonitor;
pub use engine::{CycleReport, DispatchOutcome, SyncEngine, SyncEngineBuilder};
pub use queue::SyncQueue;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during synchronization operations
///
/// None of these terminate the engine. Dispatch failures end in a requeue,
/// a quarantine record or a recorded conflict; the variants are used to
/// label those outcomes and to reject triggers that cannot run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote store could not be reached; no attempt was counted
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The remote store refused the mutation
    #[error("Remote rejected the mutation ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// The local mutation diverged from the remote state
    #[error("Conflict on entity {entity}")]
    Conflict { entity: String },

    /// The item used up its retry budget and was quarantined
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The payload could not be decoded in time
    #[error("Compression timed out after {0:?}")]
    CompressionTimeout(Duration),

    /// The durable queue store rejected a write
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// The engine is disabled in configuration
    #[error("Sync is disabled")]
    Disabled,

    /// The engine is offline; no cycle was started
    #[error("Sync is offline")]
    Offline,

    /// Another cycle is already running
    #[error("A sync cycle is already in progress")]
    CycleInProgress,

    /// A conflict could not be resolved
    #[error("Conflict resolution failed: {0}")]
    Resolution(#[from] tidesync_conflict::ConflictError),
}

impl From<tidesync_codec::CodecError> for SyncError {
    fn from(err: tidesync_codec::CodecError) -> Self {
        match err {
            tidesync_codec::CodecError::Timeout(after) => SyncError::CompressionTimeout(after),
            other => SyncError::RemoteRejected {
                status: 0,
                message: format!("payload could not be decoded: {}", other),
            },
        }
    }
}

impl From<tidesync_core::ports::RemoteError> for SyncError {
    fn from(err: tidesync_core::ports::RemoteError) -> Self {
        use tidesync_core::ports::RemoteError;
        match err {
            RemoteError::Unavailable(msg) => SyncError::NetworkUnavailable(msg),
            RemoteError::Rejected { status, message } => {
                SyncError::RemoteRejected { status, message }
            }
        }
    }
}
