//! TideSync Audit - Audit trail
//!
//! Provides:
//! - `AuditLogger`: High-level service for recording sync events
//! - `ReasonCode`: Structured codes for failures and conflicts
//! - `TracingAuditSink`: An `IAuditSink` that writes events to the log

pub mod logger;
pub mod reason;
pub mod sink;

pub use logger::AuditLogger;
pub use reason::ReasonCode;
pub use sink::TracingAuditSink;
