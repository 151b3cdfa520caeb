//! Queued mutation entities
//!
//! A [`SyncQueueItem`] is one unit of pending work: a mutation produced
//! locally that still has to be dispatched to the remote store. Items are
//! owned by the sync queue from enqueue until they are dispatched
//! successfully or moved to quarantine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{EntityKey, QueueItemId};

/// Version tag written alongside every persisted queue snapshot
pub const QUEUE_SCHEMA_VERSION: u32 = 1;

/// Number of quarantine records retained (most recent first)
pub const QUARANTINE_CAPACITY: usize = 100;

// ============================================================================
// OperationType
// ============================================================================

/// The kind of remote mutation a queue item carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Create a new entity
    Create,
    /// Patch an existing entity
    Update,
    /// Remove an entity
    Delete,
    /// Insert many records into a collection at once
    BulkInsert,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
            OperationType::BulkInsert => "bulk_insert",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OperationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(OperationType::Create),
            "update" => Ok(OperationType::Update),
            "delete" => Ok(OperationType::Delete),
            "bulk_insert" => Ok(OperationType::BulkInsert),
            other => Err(DomainError::InvalidOperation(other.to_string())),
        }
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Three-level dispatch priority; higher values are more urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    Low = 1,
    Normal = 2,
    High = 3,
}

impl Priority {
    /// Returns the numeric level (1..=3)
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Returns the next lower priority, saturating at [`Priority::Low`]
    ///
    /// ```
    /// use tidesync_core::domain::queue_item::Priority;
    ///
    /// assert_eq!(Priority::High.demoted(), Priority::Normal);
    /// assert_eq!(Priority::Low.demoted(), Priority::Low);
    /// ```
    pub fn demoted(self) -> Self {
        match self {
            Priority::High => Priority::Normal,
            Priority::Normal | Priority::Low => Priority::Low,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl TryFrom<u8> for Priority {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Normal),
            3 => Ok(Priority::High),
            other => Err(DomainError::InvalidPriority(other.to_string())),
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(DomainError::InvalidPriority(other.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Mutation - producer-side request
// ============================================================================

/// A mutation handed to the engine by a producer
///
/// The engine turns it into a [`SyncQueueItem`] at enqueue time. When no
/// priority is given, the configured default priority is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub operation: OperationType,
    pub entity: EntityKey,
    pub payload: Vec<u8>,
    pub priority: Option<Priority>,
    /// Modification marker of the entity version this mutation was derived from
    pub base_version: Option<DateTime<Utc>>,
}

impl Mutation {
    fn new(operation: OperationType, entity: EntityKey, payload: Vec<u8>) -> Self {
        Self {
            operation,
            entity,
            payload,
            priority: None,
            base_version: None,
        }
    }

    /// A `Create` of `entity` with the given record content
    pub fn create(entity: EntityKey, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(OperationType::Create, entity, payload.into())
    }

    /// An `Update` of `entity` with the given patch
    pub fn update(entity: EntityKey, patch: impl Into<Vec<u8>>) -> Self {
        Self::new(OperationType::Update, entity, patch.into())
    }

    /// A `Delete` of `entity`
    pub fn delete(entity: EntityKey) -> Self {
        Self::new(OperationType::Delete, entity, Vec::new())
    }

    /// A `BulkInsert` of encoded `records` into `collection`
    pub fn bulk_insert(collection: EntityKey, records: impl Into<Vec<u8>>) -> Self {
        Self::new(OperationType::BulkInsert, collection, records.into())
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_base_version(mut self, base_version: DateTime<Utc>) -> Self {
        self.base_version = Some(base_version);
        self
    }
}

// ============================================================================
// SyncQueueItem
// ============================================================================

/// A unit of pending work in the sync queue
///
/// ## Lifecycle
///
/// ```text
/// enqueue ──→ queued ──→ dispatched (removed)
///               │  ▲
///       failure │  │ requeue (retry_count + 1, priority demoted, backoff)
///               ▼  │
///            retrying ──→ quarantined (retry_count == max_retries)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    id: QueueItemId,
    operation: OperationType,
    entity: EntityKey,
    #[serde(with = "payload_base64")]
    payload: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    base_version: Option<DateTime<Utc>>,
    retry_count: u32,
    priority: Priority,
    compressed: bool,
    original_size: u64,
    next_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl SyncQueueItem {
    /// Creates a fresh, uncompressed queue item enqueued now
    pub fn new(
        operation: OperationType,
        entity: EntityKey,
        payload: Vec<u8>,
        priority: Priority,
    ) -> Self {
        let original_size = payload.len() as u64;
        Self {
            id: QueueItemId::new(),
            operation,
            entity,
            payload,
            enqueued_at: Utc::now(),
            base_version: None,
            retry_count: 0,
            priority,
            compressed: false,
            original_size,
            next_attempt_at: None,
            last_error: None,
        }
    }

    /// Builds a queue item from a producer mutation
    pub fn from_mutation(mutation: Mutation, default_priority: Priority) -> Self {
        let mut item = Self::new(
            mutation.operation,
            mutation.entity,
            mutation.payload,
            mutation.priority.unwrap_or(default_priority),
        );
        item.base_version = mutation.base_version;
        item
    }

    pub fn id(&self) -> &QueueItemId {
        &self.id
    }

    pub fn operation(&self) -> OperationType {
        self.operation
    }

    pub fn entity(&self) -> &EntityKey {
        &self.entity
    }

    /// Returns the payload bytes in their current (possibly compressed) form
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn base_version(&self) -> Option<DateTime<Utc>> {
        self.base_version
    }

    /// Modification marker the local mutation was derived from
    ///
    /// Falls back to the enqueue time when the producer did not supply one.
    pub fn base_marker(&self) -> DateTime<Utc> {
        self.base_version.unwrap_or(self.enqueued_at)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Size of the payload before compression
    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn next_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.next_attempt_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns true if the item's backoff delay has elapsed at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.map_or(true, |at| at <= now)
    }

    /// Replaces the payload with its compressed form
    pub fn set_compressed_payload(&mut self, compressed: Vec<u8>) {
        self.payload = compressed;
        self.compressed = true;
    }

    /// Replaces the payload with new uncompressed content
    pub fn replace_payload(&mut self, payload: Vec<u8>) {
        self.original_size = payload.len() as u64;
        self.payload = payload;
        self.compressed = false;
    }

    /// Records a failed dispatch attempt
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.last_error = Some(error.into());
    }

    /// Lowers the priority by one level (floor at `Low`)
    pub fn demote_priority(&mut self) {
        self.priority = self.priority.demoted();
    }

    /// Holds the item back until `at`
    pub fn schedule_retry(&mut self, at: DateTime<Utc>) {
        self.next_attempt_at = Some(at);
    }

    /// Makes the item immediately dispatchable again
    pub fn clear_backoff(&mut self) {
        self.next_attempt_at = None;
    }

    /// Rewrites the item so that dispatching it overwrites the remote
    /// version identified by `remote_marker`
    ///
    /// A `Create` that collided with an existing entity becomes an `Update`.
    pub fn overwrite_remote(&mut self, remote_marker: Option<DateTime<Utc>>) {
        if self.operation == OperationType::Create {
            self.operation = OperationType::Update;
        }
        if let Some(marker) = remote_marker {
            self.base_version = Some(marker);
        }
        self.next_attempt_at = None;
    }
}

// ============================================================================
// QuarantineRecord
// ============================================================================

/// Terminal record for an item that exhausted its retry budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub item: SyncQueueItem,
    pub reason: String,
    pub quarantined_at: DateTime<Utc>,
}

impl QuarantineRecord {
    pub fn new(item: SyncQueueItem, reason: impl Into<String>) -> Self {
        Self {
            item,
            reason: reason.into(),
            quarantined_at: Utc::now(),
        }
    }
}

// ============================================================================
// QueueSnapshot
// ============================================================================

/// Durable form of the queue: the ordered item list plus a schema tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub schema_version: u32,
    pub items: Vec<SyncQueueItem>,
}

impl QueueSnapshot {
    pub fn new(items: Vec<SyncQueueItem>) -> Self {
        Self {
            schema_version: QUEUE_SCHEMA_VERSION,
            items,
        }
    }

    /// Returns true if this snapshot was written by a compatible schema
    pub fn is_supported(&self) -> bool {
        self.schema_version == QUEUE_SCHEMA_VERSION
    }
}

/// Serializes payload bytes as standard base64 text
mod payload_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
