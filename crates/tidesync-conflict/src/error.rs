//! Conflict registry and policy errors

use thiserror::Error;
use tidesync_core::domain::ConflictId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConflictError {
    /// No conflict with this id was ever detected, or it was cleared
    #[error("no conflict with id {0}")]
    NotFound(ConflictId),

    /// The conflict already carries a resolution
    #[error("conflict {0} is already resolved")]
    AlreadyResolved(ConflictId),

    /// A policy rule has a bad glob or an unknown strategy
    #[error("conflict rule '{pattern}' rejected: {reason}")]
    InvalidRule { pattern: String, reason: String },
}
