//! Conflict detection logic
//!
//! Runs after the remote store rejected a dispatch. Compares the queued
//! mutation with the entity's current remote state to decide whether the
//! rejection was a genuine divergence, an idempotent replay, or an
//! ordinary failure.

use tracing::{debug, info};

use tidesync_core::domain::{
    ConflictType, OperationType, ResolutionStrategy, SyncConflict, SyncQueueItem,
};
use tidesync_core::ports::RemoteRecord;

use crate::policy::PolicyEngine;

/// Result of conflict detection check
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    /// No divergence: treat the rejection as a normal failure
    NoConflict,
    /// The remote already reflects this mutation
    AlreadyApplied,
    /// Local and remote diverged
    Conflicted(Box<SyncConflict>),
}

/// Detects conflicts between a queued mutation and remote state
pub struct ConflictDetector;

impl ConflictDetector {
    /// Classifies `item` against the remote state of its entity
    ///
    /// `payload` is the item's uncompressed payload; `remote` is `None`
    /// when the entity does not exist remotely.
    ///
    /// | operation  | remote absent   | remote present                                 |
    /// |------------|-----------------|------------------------------------------------|
    /// | Create     | NoConflict      | same content: AlreadyApplied, else ConcurrentUpdate |
    /// | Update     | DeleteVsUpdate  | newer than base: ConcurrentUpdate              |
    /// | Delete     | AlreadyApplied  | newer than base: DeleteVsUpdate                |
    /// | BulkInsert | NoConflict      | NoConflict                                     |
    pub fn detect(
        item: &SyncQueueItem,
        payload: &[u8],
        remote: Option<&RemoteRecord>,
    ) -> DetectionResult {
        let base = item.base_marker();

        let conflict_type = match (item.operation(), remote) {
            (OperationType::BulkInsert, _) => return DetectionResult::NoConflict,

            (OperationType::Create, None) => return DetectionResult::NoConflict,
            (OperationType::Create, Some(record)) if record.data == payload => {
                debug!(entity = %item.entity(), "Remote already holds the created content");
                return DetectionResult::AlreadyApplied;
            }
            (OperationType::Create, Some(_)) => ConflictType::ConcurrentUpdate,

            (OperationType::Update, None) => ConflictType::DeleteVsUpdate,
            (OperationType::Update, Some(record)) if record.modified_at > base => {
                ConflictType::ConcurrentUpdate
            }
            (OperationType::Update, Some(_)) => return DetectionResult::NoConflict,

            (OperationType::Delete, None) => {
                debug!(entity = %item.entity(), "Entity already deleted remotely");
                return DetectionResult::AlreadyApplied;
            }
            (OperationType::Delete, Some(record)) if record.modified_at > base => {
                ConflictType::DeleteVsUpdate
            }
            (OperationType::Delete, Some(_)) => return DetectionResult::NoConflict,
        };

        let remote_marker = remote.map(|r| r.modified_at);
        info!(
            entity = %item.entity(),
            item_id = %item.id(),
            operation = %item.operation(),
            conflict_type = %conflict_type,
            local_marker = %base,
            remote_marker = ?remote_marker,
            "Conflict detected"
        );

        DetectionResult::Conflicted(Box::new(SyncConflict::new(
            *item.id(),
            item.entity().clone(),
            conflict_type,
            base,
            remote_marker,
        )))
    }

    /// Returns the automatic resolution for `conflict`, if policy has one
    pub fn should_auto_resolve(
        conflict: &SyncConflict,
        policy: &PolicyEngine,
    ) -> Option<ResolutionStrategy> {
        let strategy = policy.evaluate(conflict.entity().as_str());
        if let Some(ref s) = strategy {
            debug!(
                entity = %conflict.entity(),
                strategy = %s,
                "Conflict eligible for automatic resolution"
            );
        }
        strategy
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use tidesync_core::config::ConflictRule;
    use tidesync_core::domain::{EntityKey, Mutation, Priority};

    use super::*;

    fn key(s: &str) -> EntityKey {
        EntityKey::new(s).unwrap()
    }

    fn queued(mutation: Mutation) -> SyncQueueItem {
        SyncQueueItem::from_mutation(mutation, Priority::Normal)
    }

    fn remote(entity: &str, data: &[u8], modified_at: DateTime<Utc>) -> RemoteRecord {
        RemoteRecord {
            entity: key(entity),
            data: data.to_vec(),
            modified_at,
        }
    }

    #[test]
    fn test_create_with_absent_remote_is_not_a_conflict() {
        let item = queued(Mutation::create(key("notes/1"), b"hello".to_vec()));
        assert_eq!(
            ConflictDetector::detect(&item, b"hello", None),
            DetectionResult::NoConflict
        );
    }

    #[test]
    fn test_create_with_identical_remote_is_already_applied() {
        let item = queued(Mutation::create(key("notes/1"), b"hello".to_vec()));
        let record = remote("notes/1", b"hello", Utc::now());
        assert_eq!(
            ConflictDetector::detect(&item, b"hello", Some(&record)),
            DetectionResult::AlreadyApplied
        );
    }

    #[test]
    fn test_create_with_different_remote_is_concurrent_update() {
        let item = queued(Mutation::create(key("notes/1"), b"mine".to_vec()));
        let record = remote("notes/1", b"theirs", Utc::now());

        let DetectionResult::Conflicted(conflict) =
            ConflictDetector::detect(&item, b"mine", Some(&record))
        else {
            panic!("expected conflict");
        };
        assert_eq!(conflict.conflict_type(), ConflictType::ConcurrentUpdate);
        assert_eq!(conflict.item_id(), item.id());
        assert_eq!(conflict.remote_marker(), Some(record.modified_at));
    }

    #[test]
    fn test_update_against_newer_remote_is_concurrent_update() {
        let base = Utc::now() - Duration::minutes(10);
        let item = queued(Mutation::update(key("notes/1"), b"patch".to_vec()).with_base_version(base));
        let record = remote("notes/1", b"other", base + Duration::minutes(5));

        let result = ConflictDetector::detect(&item, b"patch", Some(&record));
        let DetectionResult::Conflicted(conflict) = result else {
            panic!("expected conflict");
        };
        assert_eq!(conflict.conflict_type(), ConflictType::ConcurrentUpdate);
        assert_eq!(conflict.local_marker(), base);
    }

    #[test]
    fn test_update_against_older_remote_is_not_a_conflict() {
        let base = Utc::now();
        let item = queued(Mutation::update(key("notes/1"), b"patch".to_vec()).with_base_version(base));
        let record = remote("notes/1", b"other", base - Duration::minutes(1));

        assert_eq!(
            ConflictDetector::detect(&item, b"patch", Some(&record)),
            DetectionResult::NoConflict
        );
    }

    #[test]
    fn test_update_of_deleted_entity_is_delete_vs_update() {
        let item = queued(Mutation::update(key("notes/1"), b"patch".to_vec()));
        let DetectionResult::Conflicted(conflict) = ConflictDetector::detect(&item, b"patch", None)
        else {
            panic!("expected conflict");
        };
        assert_eq!(conflict.conflict_type(), ConflictType::DeleteVsUpdate);
        assert!(conflict.remote_marker().is_none());
    }

    #[test]
    fn test_delete_of_absent_entity_is_already_applied() {
        let item = queued(Mutation::delete(key("notes/1")));
        assert_eq!(
            ConflictDetector::detect(&item, b"", None),
            DetectionResult::AlreadyApplied
        );
    }

    #[test]
    fn test_delete_of_remotely_updated_entity_is_delete_vs_update() {
        let base = Utc::now() - Duration::hours(1);
        let item = queued(Mutation::delete(key("notes/1")).with_base_version(base));
        let record = remote("notes/1", b"edited", Utc::now());

        let result = ConflictDetector::detect(&item, b"", Some(&record));
        let DetectionResult::Conflicted(conflict) = result else {
            panic!("expected a conflict, got {result:?}");
        };
        assert_eq!(conflict.conflict_type(), ConflictType::DeleteVsUpdate);
    }

    #[test]
    fn test_bulk_insert_never_conflicts() {
        let item = queued(Mutation::bulk_insert(key("contacts"), b"[{}]".to_vec()));
        let record = remote("contacts", b"[]", Utc::now());
        assert_eq!(
            ConflictDetector::detect(&item, b"[{}]", Some(&record)),
            DetectionResult::NoConflict
        );
    }

    #[test]
    fn test_should_auto_resolve_follows_policy() {
        let policy = PolicyEngine::new(
            "manual",
            &[ConflictRule {
                pattern: "cache/*".to_string(),
                strategy: "prefer_remote".to_string(),
            }],
        );

        let auto = SyncConflict::new(
            tidesync_core::domain::QueueItemId::new(),
            key("cache/avatar"),
            ConflictType::ConcurrentUpdate,
            Utc::now(),
            Some(Utc::now()),
        );
        let manual = SyncConflict::new(
            tidesync_core::domain::QueueItemId::new(),
            key("notes/1"),
            ConflictType::ConcurrentUpdate,
            Utc::now(),
            Some(Utc::now()),
        );

        assert_eq!(
            ConflictDetector::should_auto_resolve(&auto, &policy),
            Some(ResolutionStrategy::PreferRemote)
        );
        assert_eq!(ConflictDetector::should_auto_resolve(&manual, &policy), None);
    }
}
