//! Domain error types
//!
//! Validation failures and invalid values raised while constructing
//! domain types.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid entity key format or content
    #[error("Invalid entity key: {0}")]
    InvalidEntityKey(String),

    /// Unknown operation type name
    #[error("Invalid operation type: {0}")]
    InvalidOperation(String),

    /// Priority level outside the 1..=3 scheme
    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    /// Unknown resolution strategy name
    #[error("Invalid resolution strategy: {0}")]
    InvalidStrategy(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidEntityKey("key is empty".to_string());
        assert_eq!(err.to_string(), "Invalid entity key: key is empty");

        let err = DomainError::InvalidPriority("7".to_string());
        assert_eq!(err.to_string(), "Invalid priority: 7");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidOperation("upsert".to_string());
        let err2 = DomainError::InvalidOperation("upsert".to_string());
        let err3 = DomainError::InvalidOperation("merge".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
