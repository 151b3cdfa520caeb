//! Remote store port (driven/secondary port)
//!
//! The authoritative remote data store that queued mutations are
//! dispatched to. Implementations live in adapter crates; the HTTP adapter
//! is `tidesync-remote`.
//!
//! ## Design Notes
//!
//! - Unlike the storage ports, this port returns a classified
//!   [`RemoteError`]: the worker loop must tell a transient outage
//!   (item stays queued) apart from a rejection (retry accounting).
//! - `get_current_state` returns `None` when the entity does not exist.
//!   The detector relies on that distinction for delete/update conflicts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::newtypes::EntityKey;

/// State of one entity as currently held by the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub entity: EntityKey,
    /// Raw record content
    pub data: Vec<u8>,
    /// Remote modification marker
    pub modified_at: DateTime<Utc>,
}

/// Failure reported by a remote store call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote could not be reached or asked us to back off
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The remote processed the request and refused it
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        RemoteError::Unavailable(reason.into())
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the error says nothing about the request itself
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote store operations used by the sync worker
#[async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Creates `entity` with the given record content
    async fn create(&self, entity: &EntityKey, payload: &[u8]) -> RemoteResult<()>;

    /// Applies `patch` to an existing entity
    async fn update(&self, entity: &EntityKey, patch: &[u8]) -> RemoteResult<()>;

    /// Removes `entity`; deleting an absent entity is not an error
    async fn delete(&self, entity: &EntityKey) -> RemoteResult<()>;

    /// Inserts a batch of encoded records into `collection`
    async fn bulk_insert(&self, collection: &EntityKey, records: &[u8]) -> RemoteResult<()>;

    /// Fetches the current state of `entity`, `None` if it does not exist
    async fn get_current_state(&self, entity: &EntityKey) -> RemoteResult<Option<RemoteRecord>>;

    /// Lightweight reachability probe used by the connectivity monitor
    async fn is_reachable(&self) -> bool;
}
