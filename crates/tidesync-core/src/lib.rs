//! TideSync Core - Domain model, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SyncQueueItem`, `SyncConflict`, `SyncStatus`, `AuditEvent`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `IQueueStore`, `IAuditSink`
//! - **Configuration** - Typed YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module contains pure data and business rules with no I/O.
//! Ports define trait interfaces that adapter crates implement; the sync
//! engine in `tidesync-sync` depends only on these traits.

pub mod config;
pub mod domain;
pub mod ports;
