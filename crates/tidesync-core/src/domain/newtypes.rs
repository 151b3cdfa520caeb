//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for queue item identifiers, conflict identifiers
//! and entity keys. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier assigned to a [`SyncQueueItem`](super::queue_item::SyncQueueItem)
/// at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    /// Create a new random QueueItemId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a QueueItemId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QueueItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid QueueItemId: {e}")))
    }
}

/// Identifier for [`SyncConflict`](super::conflict::SyncConflict) records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Create a new random ConflictId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ConflictId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConflictId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConflictId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid ConflictId: {e}")))
    }
}

// ============================================================================
// EntityKey
// ============================================================================

/// Maximum accepted length of an entity key, in bytes
const MAX_ENTITY_KEY_LEN: usize = 512;

/// Key of the logical remote entity a queued mutation targets
///
/// For `BulkInsert` operations the key names the target collection.
/// Keys are non-empty, at most 512 bytes, and contain no control characters
/// or whitespace-only content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityKey(String);

impl EntityKey {
    /// Creates a validated entity key
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidEntityKey`] if the key is empty, too
    /// long, or contains control characters.
    ///
    /// # Example
    ///
    /// ```
    /// use tidesync_core::domain::newtypes::EntityKey;
    ///
    /// let key = EntityKey::new("notes/42").unwrap();
    /// assert_eq!(key.as_str(), "notes/42");
    /// assert!(EntityKey::new("").is_err());
    /// ```
    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(DomainError::InvalidEntityKey("key is empty".to_string()));
        }
        if key.len() > MAX_ENTITY_KEY_LEN {
            return Err(DomainError::InvalidEntityKey(format!(
                "key exceeds {MAX_ENTITY_KEY_LEN} bytes"
            )));
        }
        if key.chars().any(char::is_control) {
            return Err(DomainError::InvalidEntityKey(format!(
                "key contains control characters: {key:?}"
            )));
        }
        Ok(Self(key))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_item_id_roundtrip_through_string() {
        let id = QueueItemId::new();
        let parsed: QueueItemId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_conflict_id_rejects_garbage() {
        let err = "not-a-uuid".parse::<ConflictId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(QueueItemId::new(), QueueItemId::new());
        assert_ne!(ConflictId::new(), ConflictId::new());
    }

    #[test]
    fn test_entity_key_valid() {
        let key = EntityKey::new("projects/alpha/tasks/7").unwrap();
        assert_eq!(key.to_string(), "projects/alpha/tasks/7");
    }

    #[test]
    fn test_entity_key_rejects_blank() {
        assert!(EntityKey::new("").is_err());
        assert!(EntityKey::new("   ").is_err());
    }

    #[test]
    fn test_entity_key_rejects_control_chars() {
        assert!(EntityKey::new("notes\n1").is_err());
    }

    #[test]
    fn test_entity_key_rejects_oversized() {
        let long = "x".repeat(MAX_ENTITY_KEY_LEN + 1);
        assert!(EntityKey::new(long).is_err());
    }

    #[test]
    fn test_entity_key_serde_validates() {
        let key: EntityKey = serde_json::from_str("\"notes/1\"").unwrap();
        assert_eq!(key.as_str(), "notes/1");

        let bad: Result<EntityKey, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }
}
