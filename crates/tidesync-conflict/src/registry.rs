//! Conflict registry
//!
//! In-memory owner of the conflict list. Tracks which entities are blocked
//! by an unresolved conflict so the queue can hold every item for them,
//! and enforces that only unresolved conflicts can be resolved.
//!
//! The registry does no I/O; the engine persists each change through the
//! queue store after mutating it.

use std::collections::HashSet;

use tracing::{debug, info};

use tidesync_core::domain::{
    ConflictId, EntityKey, ResolutionSource, ResolutionStrategy, SyncConflict,
};

use crate::error::ConflictError;

#[derive(Debug, Default)]
pub struct ConflictRegistry {
    conflicts: Vec<SyncConflict>,
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from persisted conflicts
    pub fn from_conflicts(conflicts: Vec<SyncConflict>) -> Self {
        debug!(count = conflicts.len(), "Conflict registry restored");
        Self { conflicts }
    }

    /// Adds a newly detected conflict
    pub fn record(&mut self, conflict: SyncConflict) {
        info!(
            conflict_id = %conflict.id(),
            entity = %conflict.entity(),
            conflict_type = %conflict.conflict_type(),
            "Conflict recorded"
        );
        self.conflicts.push(conflict);
    }

    /// Returns all conflicts, resolved ones included, in detection order
    pub fn all(&self) -> &[SyncConflict] {
        &self.conflicts
    }

    pub fn get(&self, id: &ConflictId) -> Option<&SyncConflict> {
        self.conflicts.iter().find(|c| c.id() == id)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &SyncConflict> {
        self.conflicts.iter().filter(|c| !c.is_resolved())
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved().count()
    }

    /// Entities that currently have at least one unresolved conflict
    pub fn blocked_entities(&self) -> HashSet<EntityKey> {
        self.unresolved().map(|c| c.entity().clone()).collect()
    }

    /// Marks a conflict resolved and returns the updated record
    ///
    /// # Errors
    ///
    /// - [`ConflictError::NotFound`] if no conflict has this id
    /// - [`ConflictError::AlreadyResolved`] if it was resolved before
    pub fn resolve(
        &mut self,
        id: &ConflictId,
        strategy: ResolutionStrategy,
        source: ResolutionSource,
    ) -> Result<SyncConflict, ConflictError> {
        let slot = self
            .conflicts
            .iter_mut()
            .find(|c| c.id() == id)
            .ok_or_else(|| ConflictError::NotFound(*id))?;

        if slot.is_resolved() {
            return Err(ConflictError::AlreadyResolved(*id));
        }

        let strategy_name = strategy.name();
        let resolved = slot.clone().resolve(strategy, source);
        *slot = resolved.clone();

        info!(
            conflict_id = %id,
            entity = %resolved.entity(),
            strategy = strategy_name,
            "Conflict resolved"
        );
        Ok(resolved)
    }

    /// Drops every resolved conflict and returns how many were removed
    pub fn clear_resolved(&mut self) -> usize {
        let before = self.conflicts.len();
        self.conflicts.retain(|c| !c.is_resolved());
        let removed = before - self.conflicts.len();
        debug!(removed, "Cleared resolved conflicts");
        removed
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tidesync_core::domain::{ConflictType, QueueItemId};

    use super::*;

    fn conflict(entity: &str) -> SyncConflict {
        SyncConflict::new(
            QueueItemId::new(),
            EntityKey::new(entity).unwrap(),
            ConflictType::ConcurrentUpdate,
            Utc::now(),
            Some(Utc::now()),
        )
    }

    #[test]
    fn test_unresolved_conflict_blocks_entity() {
        let mut registry = ConflictRegistry::new();
        registry.record(conflict("notes/1"));

        let blocked = registry.blocked_entities();
        assert!(blocked.contains(&EntityKey::new("notes/1").unwrap()));
        assert!(!blocked.contains(&EntityKey::new("notes/2").unwrap()));
        assert_eq!(blocked.len(), 1);
    }

    #[test]
    fn test_resolve_releases_entity() {
        let mut registry = ConflictRegistry::new();
        let c = conflict("notes/1");
        let id = *c.id();
        registry.record(c);

        let resolved = registry
            .resolve(&id, ResolutionStrategy::PreferRemote, ResolutionSource::User)
            .unwrap();

        assert!(resolved.is_resolved());
        assert!(registry.blocked_entities().is_empty());
        assert_eq!(registry.unresolved_count(), 0);
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn test_resolve_unknown_id_is_not_found() {
        let mut registry = ConflictRegistry::new();
        let err = registry
            .resolve(&ConflictId::new(), ResolutionStrategy::PreferLocal, ResolutionSource::User)
            .unwrap_err();
        assert!(matches!(err, ConflictError::NotFound(_)));
    }

    #[test]
    fn test_resolve_twice_is_already_resolved() {
        let mut registry = ConflictRegistry::new();
        let c = conflict("notes/1");
        let id = *c.id();
        registry.record(c);

        registry
            .resolve(&id, ResolutionStrategy::PreferLocal, ResolutionSource::User)
            .unwrap();
        let err = registry
            .resolve(&id, ResolutionStrategy::PreferRemote, ResolutionSource::User)
            .unwrap_err();

        assert!(matches!(err, ConflictError::AlreadyResolved(_)));
        assert_eq!(
            registry.get(&id).unwrap().resolution(),
            Some(&ResolutionStrategy::PreferLocal)
        );
    }

    #[test]
    fn test_entity_stays_blocked_while_any_conflict_is_open() {
        let mut registry = ConflictRegistry::new();
        let first = conflict("notes/1");
        let first_id = *first.id();
        registry.record(first);
        registry.record(conflict("notes/1"));

        registry
            .resolve(&first_id, ResolutionStrategy::PreferRemote, ResolutionSource::User)
            .unwrap();

        assert!(registry
            .blocked_entities()
            .contains(&EntityKey::new("notes/1").unwrap()));
    }

    #[test]
    fn test_clear_resolved() {
        let mut registry = ConflictRegistry::from_conflicts(vec![conflict("a"), conflict("b")]);
        let id = *registry.all()[0].id();
        registry
            .resolve(&id, ResolutionStrategy::PreferRemote, ResolutionSource::Policy)
            .unwrap();

        assert_eq!(registry.clear_resolved(), 1);
        assert_eq!(registry.all().len(), 1);
        assert_eq!(registry.all()[0].entity().as_str(), "b");
    }
}
