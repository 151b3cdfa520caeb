//! Conflicts between a queued mutation and the remote's current state
//!
//! A [`SyncConflict`] is created by the detector when a rejected dispatch
//! turns out to race a newer remote change. It stays unresolved, and its
//! entity stays gated, until a [`ResolutionStrategy`] is applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ConflictId, EntityKey, QueueItemId};

/// Kind of divergence between local intent and remote state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Both sides modified the entity (or a create collided with different content)
    ConcurrentUpdate,
    /// One side deleted the entity while the other updated it
    DeleteVsUpdate,
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConflictType::ConcurrentUpdate => "concurrent_update",
            ConflictType::DeleteVsUpdate => "delete_vs_update",
        };
        write!(f, "{}", s)
    }
}

/// How a conflict should be or was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Re-dispatch the local operation, overwriting the remote
    PreferLocal,
    /// Discard the local operation; the remote version wins
    PreferRemote,
    /// Dispatch a caller-supplied merged payload in place of the original
    Merge(Vec<u8>),
}

impl ResolutionStrategy {
    /// Returns the strategy name without any merge payload
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionStrategy::PreferLocal => "prefer_local",
            ResolutionStrategy::PreferRemote => "prefer_remote",
            ResolutionStrategy::Merge(_) => "merge",
        }
    }

    /// Parses a payload-less strategy name (`prefer_local` / `prefer_remote`)
    pub fn parse_automatic(s: &str) -> Result<Self, DomainError> {
        match s {
            "prefer_local" => Ok(ResolutionStrategy::PreferLocal),
            "prefer_remote" => Ok(ResolutionStrategy::PreferRemote),
            other => Err(DomainError::InvalidStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Who or what initiated the conflict resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// An operator explicitly chose the resolution
    User,
    /// Automatic resolution based on configured policy
    Policy,
    /// System-initiated resolution
    System,
}

impl std::fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResolutionSource::User => "user",
            ResolutionSource::Policy => "policy",
            ResolutionSource::System => "system",
        };
        write!(f, "{}", s)
    }
}

/// A recorded divergence between a queued mutation and the remote state
///
/// Conflicts are created by the detector during dispatch. The only
/// permitted mutation is [`SyncConflict::resolve`]; resolved conflicts are
/// retained until resolved conflicts are explicitly cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    id: ConflictId,
    /// The queued item whose dispatch revealed the conflict
    item_id: QueueItemId,
    /// The entity both sides touched
    entity: EntityKey,
    conflict_type: ConflictType,
    detected_at: DateTime<Utc>,
    /// Modification marker the local mutation was derived from
    local_marker: DateTime<Utc>,
    /// Modification marker observed on the remote (None if the entity is gone)
    remote_marker: Option<DateTime<Utc>>,
    resolution: Option<ResolutionStrategy>,
    resolved_at: Option<DateTime<Utc>>,
    resolved_by: Option<ResolutionSource>,
}

impl SyncConflict {
    /// Creates a new unresolved conflict
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::Utc;
    /// use tidesync_core::domain::conflict::{ConflictType, SyncConflict};
    /// use tidesync_core::domain::newtypes::{EntityKey, QueueItemId};
    ///
    /// let conflict = SyncConflict::new(
    ///     QueueItemId::new(),
    ///     EntityKey::new("notes/1").unwrap(),
    ///     ConflictType::ConcurrentUpdate,
    ///     Utc::now(),
    ///     Some(Utc::now()),
    /// );
    /// assert!(!conflict.is_resolved());
    /// ```
    pub fn new(
        item_id: QueueItemId,
        entity: EntityKey,
        conflict_type: ConflictType,
        local_marker: DateTime<Utc>,
        remote_marker: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: ConflictId::new(),
            item_id,
            entity,
            conflict_type,
            detected_at: Utc::now(),
            local_marker,
            remote_marker,
            resolution: None,
            resolved_at: None,
            resolved_by: None,
        }
    }

    pub fn id(&self) -> &ConflictId {
        &self.id
    }

    pub fn item_id(&self) -> &QueueItemId {
        &self.item_id
    }

    pub fn entity(&self) -> &EntityKey {
        &self.entity
    }

    pub fn conflict_type(&self) -> ConflictType {
        self.conflict_type
    }

    /// Returns when the conflict was detected
    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub fn local_marker(&self) -> DateTime<Utc> {
        self.local_marker
    }

    pub fn remote_marker(&self) -> Option<DateTime<Utc>> {
        self.remote_marker
    }

    pub fn resolution(&self) -> Option<&ResolutionStrategy> {
        self.resolution.as_ref()
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn resolved_by(&self) -> Option<&ResolutionSource> {
        self.resolved_by.as_ref()
    }

    /// Returns true if the conflict has been resolved
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Resolves the conflict with the given strategy and source
    ///
    /// If the conflict is already resolved this is a no-op and the
    /// original resolution is kept.
    pub fn resolve(mut self, strategy: ResolutionStrategy, source: ResolutionSource) -> Self {
        if self.is_resolved() {
            return self;
        }

        self.resolution = Some(strategy);
        self.resolved_at = Some(Utc::now());
        self.resolved_by = Some(source);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_conflict() -> SyncConflict {
        SyncConflict::new(
            QueueItemId::new(),
            EntityKey::new("notes/7").unwrap(),
            ConflictType::ConcurrentUpdate,
            Utc::now() - chrono::Duration::minutes(2),
            Some(Utc::now()),
        )
    }

    #[test]
    fn test_conflict_type_display() {
        assert_eq!(ConflictType::ConcurrentUpdate.to_string(), "concurrent_update");
        assert_eq!(ConflictType::DeleteVsUpdate.to_string(), "delete_vs_update");
    }

    #[test]
    fn test_conflict_type_serialization() {
        let json = serde_json::to_string(&ConflictType::DeleteVsUpdate).unwrap();
        assert_eq!(json, "\"delete_vs_update\"");
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(ResolutionStrategy::PreferLocal.to_string(), "prefer_local");
        assert_eq!(ResolutionStrategy::PreferRemote.to_string(), "prefer_remote");
        assert_eq!(ResolutionStrategy::Merge(vec![1]).to_string(), "merge");
    }

    #[test]
    fn test_parse_automatic_strategy() {
        assert_eq!(
            ResolutionStrategy::parse_automatic("prefer_remote").unwrap(),
            ResolutionStrategy::PreferRemote
        );
        assert!(ResolutionStrategy::parse_automatic("merge").is_err());
    }

    #[test]
    fn test_conflict_creation() {
        let conflict = sample_conflict();
        assert!(!conflict.is_resolved());
        assert!(conflict.resolution().is_none());
        assert!(conflict.resolved_at().is_none());
        assert!(conflict.resolved_by().is_none());
        assert_eq!(conflict.entity().as_str(), "notes/7");
    }

    #[test]
    fn test_conflict_resolve() {
        let resolved = sample_conflict()
            .resolve(ResolutionStrategy::PreferRemote, ResolutionSource::User);

        assert!(resolved.is_resolved());
        assert_eq!(resolved.resolution(), Some(&ResolutionStrategy::PreferRemote));
        assert!(resolved.resolved_at().is_some());
        assert_eq!(resolved.resolved_by(), Some(&ResolutionSource::User));
    }

    #[test]
    fn test_second_resolution_keeps_first() {
        let resolved = sample_conflict()
            .resolve(ResolutionStrategy::PreferLocal, ResolutionSource::User);
        let resolved_at = resolved.resolved_at();

        let again = resolved.resolve(ResolutionStrategy::PreferRemote, ResolutionSource::Policy);

        assert_eq!(again.resolution(), Some(&ResolutionStrategy::PreferLocal));
        assert_eq!(again.resolved_by(), Some(&ResolutionSource::User));
        assert_eq!(again.resolved_at(), resolved_at);
    }

    #[test]
    fn test_conflict_serialization() {
        let conflict = sample_conflict()
            .resolve(ResolutionStrategy::Merge(b"merged".to_vec()), ResolutionSource::User);

        let json = serde_json::to_string(&conflict).unwrap();
        let restored: SyncConflict = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, conflict);
    }
}
