//! Durable sync queue
//!
//! Holds pending [`SyncQueueItem`]s ordered by priority, FIFO within a
//! priority level. Every mutation writes the whole queue to the
//! [`IQueueStore`] as a versioned [`QueueSnapshot`].
//!
//! ## Lifecycle
//!
//! ```text
//! enqueue ──→ queued ──dequeue_batch──→ in flight ──commit──→ gone
//!               ▲                          │
//!               └──── requeue / release ───┘
//! ```
//!
//! In-flight items are still part of every snapshot, so an item whose
//! dispatch was interrupted by a crash is dispatched again after restart.
//!
//! A failed write never fails the caller. The queue keeps working in
//! memory, reports itself degraded, and the next successful write clears
//! the flag.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tidesync_core::domain::{EntityKey, QueueItemId, QueueSnapshot, SyncQueueItem};
use tidesync_core::ports::IQueueStore;

use crate::SyncError;

#[derive(Default)]
struct QueueState {
    /// Waiting items, highest priority first
    items: Vec<SyncQueueItem>,
    /// Items handed out by `dequeue_batch` and not yet settled
    in_flight: Vec<SyncQueueItem>,
}

impl QueueState {
    fn len(&self) -> usize {
        self.items.len() + self.in_flight.len()
    }

    /// Full ordered view, in-flight items at the head of their priority band
    fn ordered(&self) -> Vec<SyncQueueItem> {
        let mut all = self.items.clone();
        for item in self.in_flight.iter().rev() {
            insert_front_of_band(&mut all, item.clone());
        }
        all
    }

    fn take_in_flight(&mut self, id: &QueueItemId) -> Option<SyncQueueItem> {
        let pos = self.in_flight.iter().position(|i| i.id() == id)?;
        Some(self.in_flight.remove(pos))
    }
}

/// Inserts before the first item of strictly lower priority
fn insert_by_priority(items: &mut Vec<SyncQueueItem>, item: SyncQueueItem) {
    let pos = items
        .iter()
        .position(|existing| existing.priority() < item.priority())
        .unwrap_or(items.len());
    items.insert(pos, item);
}

/// Inserts before the first item of equal or lower priority
fn insert_front_of_band(items: &mut Vec<SyncQueueItem>, item: SyncQueueItem) {
    let pos = items
        .iter()
        .position(|existing| existing.priority() <= item.priority())
        .unwrap_or(items.len());
    items.insert(pos, item);
}

/// Priority-ordered queue persisted through an [`IQueueStore`]
pub struct SyncQueue {
    state: Mutex<QueueState>,
    store: Arc<dyn IQueueStore>,
    degraded: AtomicBool,
}

impl SyncQueue {
    pub fn new(store: Arc<dyn IQueueStore>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            store,
            degraded: AtomicBool::new(false),
        }
    }

    /// Replaces the in-memory queue with the persisted one
    ///
    /// A missing, unreadable or unsupported record yields an empty queue.
    /// Returns the number of restored items.
    pub async fn restore(&self) -> usize {
        let snapshot = match self.store.load_queue().await {
            Ok(Some(snapshot)) if snapshot.is_supported() => snapshot,
            Ok(Some(snapshot)) => {
                warn!(
                    schema_version = snapshot.schema_version,
                    "Unsupported queue schema, starting with an empty queue"
                );
                return 0;
            }
            Ok(None) => {
                debug!("No persisted queue found");
                return 0;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted queue, starting with an empty queue");
                return 0;
            }
        };

        let mut state = self.state.lock().await;
        state.in_flight.clear();
        state.items.clear();
        for item in snapshot.items {
            insert_by_priority(&mut state.items, item);
        }
        let restored = state.items.len();
        info!(items = restored, "Sync queue restored");
        restored
    }

    /// Adds `item` behind every item of equal or higher priority
    pub async fn enqueue(&self, item: SyncQueueItem) -> QueueItemId {
        let id = *item.id();
        let mut state = self.state.lock().await;
        debug!(
            item_id = %id,
            entity = %item.entity(),
            operation = %item.operation(),
            priority = %item.priority(),
            "Item enqueued"
        );
        insert_by_priority(&mut state.items, item);
        self.persist_locked(&state).await;
        id
    }

    /// Hands out up to `max` dispatchable items in queue order
    ///
    /// Items still in backoff at `now` and items whose entity is in
    /// `blocked` are skipped and keep their position.
    pub async fn dequeue_batch(
        &self,
        max: usize,
        now: DateTime<Utc>,
        blocked: &HashSet<EntityKey>,
    ) -> Vec<SyncQueueItem> {
        let mut state = self.state.lock().await;

        let selected: Vec<usize> = state
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_due(now) && !blocked.contains(item.entity()))
            .map(|(idx, _)| idx)
            .take(max)
            .collect();

        let mut batch = Vec::with_capacity(selected.len());
        for idx in selected.into_iter().rev() {
            batch.push(state.items.remove(idx));
        }
        batch.reverse();
        state.in_flight.extend(batch.iter().cloned());

        debug!(
            batch = batch.len(),
            remaining = state.items.len(),
            "Batch dequeued"
        );
        batch
    }

    /// Settles a dispatched item; it leaves the queue for good
    pub async fn commit(&self, id: &QueueItemId) -> Option<SyncQueueItem> {
        let mut state = self.state.lock().await;
        let item = state.take_in_flight(id)?;
        self.persist_locked(&state).await;
        Some(item)
    }

    /// Puts a failed item back in priority order with its updated fields
    pub async fn requeue(&self, item: SyncQueueItem) {
        let mut state = self.state.lock().await;
        state.take_in_flight(item.id());
        debug!(
            item_id = %item.id(),
            retry_count = item.retry_count(),
            priority = %item.priority(),
            "Item requeued"
        );
        insert_by_priority(&mut state.items, item);
        self.persist_locked(&state).await;
    }

    /// Returns undispatched items to the head of their priority band
    pub async fn release(&self, items: Vec<SyncQueueItem>) {
        if items.is_empty() {
            return;
        }
        let mut state = self.state.lock().await;
        for item in items.into_iter().rev() {
            state.take_in_flight(item.id());
            insert_front_of_band(&mut state.items, item);
        }
        self.persist_locked(&state).await;
    }

    /// Applies `change` in place to the queued item with `id`
    ///
    /// `change` must not alter the priority. Returns false if no such item
    /// is queued.
    pub async fn modify<F>(&self, id: &QueueItemId, change: F) -> bool
    where
        F: FnOnce(&mut SyncQueueItem),
    {
        let mut state = self.state.lock().await;
        let Some(item) = state.items.iter_mut().find(|i| i.id() == id) else {
            return false;
        };
        change(item);
        self.persist_locked(&state).await;
        true
    }

    /// Drops an item wherever it is, queued or in flight
    pub async fn remove(&self, id: &QueueItemId) -> Option<SyncQueueItem> {
        let mut state = self.state.lock().await;
        let removed = match state.items.iter().position(|i| i.id() == id) {
            Some(pos) => Some(state.items.remove(pos)),
            None => state.take_in_flight(id),
        };
        if removed.is_some() {
            self.persist_locked(&state).await;
        }
        removed
    }

    /// Writes the current queue to the store
    pub async fn persist(&self) -> Result<(), SyncError> {
        let state = self.state.lock().await;
        let snapshot = QueueSnapshot::new(state.ordered());
        self.write(&snapshot).await
    }

    /// Number of items, in flight included
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of every item in queue order, in flight included
    pub async fn items(&self) -> Vec<SyncQueueItem> {
        self.state.lock().await.ordered()
    }

    /// True while the last write to the store failed
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    async fn persist_locked(&self, state: &QueueState) {
        let snapshot = QueueSnapshot::new(state.ordered());
        let _ = self.write(&snapshot).await;
    }

    async fn write(&self, snapshot: &QueueSnapshot) -> Result<(), SyncError> {
        match self.store.save_queue(snapshot).await {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::AcqRel) {
                    info!(items = snapshot.items.len(), "Queue persistence recovered");
                }
                Ok(())
            }
            Err(e) => {
                if !self.degraded.swap(true, Ordering::AcqRel) {
                    warn!(error = %e, "Queue persistence failed, continuing in memory");
                }
                Err(SyncError::PersistenceFailure(e.to_string()))
            }
        }
    }
}
