//! TideSync Conflict - Conflict detection and resolution
//!
//! Provides:
//! - Detection of divergence between a queued mutation and remote state
//! - Entity-pattern policies for automatic resolution
//! - The conflict registry that gates dispatch of conflicting entities

pub mod detector;
pub mod error;
pub mod policy;
pub mod registry;

pub use detector::{ConflictDetector, DetectionResult};
pub use error::ConflictError;
pub use policy::PolicyEngine;
pub use registry::ConflictRegistry;
