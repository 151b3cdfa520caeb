//! Domain entities and business rules
//!
//! This module contains the core domain types for TideSync:
//! - Newtypes for identifiers and validated entity keys
//! - Queue items, producer mutations and quarantine records
//! - Conflict records and resolution strategies
//! - The status read model
//! - Audit events
//! - Domain-specific error types

pub mod audit;
pub mod conflict;
pub mod errors;
pub mod newtypes;
pub mod queue_item;
pub mod status;

// Re-export commonly used types
pub use audit::{AuditAction, AuditEvent, AuditResult};
pub use conflict::{ConflictType, ResolutionSource, ResolutionStrategy, SyncConflict};
pub use errors::DomainError;
pub use newtypes::*;
pub use queue_item::{
    Mutation, OperationType, Priority, QuarantineRecord, QueueSnapshot, SyncQueueItem,
    QUARANTINE_CAPACITY, QUEUE_SCHEMA_VERSION,
};
pub use status::{SyncMetrics, SyncStatus, WorkerPhase};
