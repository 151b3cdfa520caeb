//! Port definitions (hexagonal architecture interfaces)
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - The authoritative remote data store
//! - [`IQueueStore`] - Durable storage for the queue, quarantine and conflicts
//! - [`IAuditSink`] - Destination for audit events

pub mod audit_sink;
pub mod queue_store;
pub mod remote_store;

pub use audit_sink::IAuditSink;
pub use queue_store::IQueueStore;
pub use remote_store::{IRemoteStore, RemoteError, RemoteRecord, RemoteResult};
