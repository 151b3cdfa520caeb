//! In-memory IQueueStore
//!
//! Keeps the same observable behavior as the SQLite store (bounded
//! quarantine, upserted conflicts) without touching disk. Writes can be
//! made to fail on demand to exercise degraded-persistence paths.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use tidesync_core::domain::{QuarantineRecord, QueueSnapshot, SyncConflict, QUARANTINE_CAPACITY};
use tidesync_core::ports::IQueueStore;

#[derive(Default)]
struct State {
    queue: Option<QueueSnapshot>,
    /// Most recent first
    quarantine: Vec<QuarantineRecord>,
    conflicts: Vec<SyncConflict>,
}

/// Non-durable queue store
#[derive(Default)]
pub struct MemoryQueueStore {
    state: Mutex<State>,
    fail_writes: AtomicBool,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of the last saved queue snapshot
    pub async fn snapshot(&self) -> Option<QueueSnapshot> {
        self.state.lock().await.queue.clone()
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("queue store is not writable");
        }
        Ok(())
    }
}

#[async_trait]
impl IQueueStore for MemoryQueueStore {
    async fn save_queue(&self, snapshot: &QueueSnapshot) -> anyhow::Result<()> {
        self.check_writable()?;
        self.state.lock().await.queue = Some(snapshot.clone());
        Ok(())
    }

    async fn load_queue(&self) -> anyhow::Result<Option<QueueSnapshot>> {
        let state = self.state.lock().await;
        Ok(state.queue.clone().filter(QueueSnapshot::is_supported))
    }

    async fn push_quarantine(&self, record: &QuarantineRecord) -> anyhow::Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        state.quarantine.insert(0, record.clone());
        state.quarantine.truncate(QUARANTINE_CAPACITY);
        Ok(())
    }

    async fn load_quarantine(&self) -> anyhow::Result<Vec<QuarantineRecord>> {
        Ok(self.state.lock().await.quarantine.clone())
    }

    async fn save_conflict(&self, conflict: &SyncConflict) -> anyhow::Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        match state.conflicts.iter_mut().find(|c| c.id() == conflict.id()) {
            Some(existing) => *existing = conflict.clone(),
            None => state.conflicts.push(conflict.clone()),
        }
        Ok(())
    }

    async fn load_conflicts(&self) -> anyhow::Result<Vec<SyncConflict>> {
        Ok(self.state.lock().await.conflicts.clone())
    }

    async fn delete_resolved_conflicts(&self) -> anyhow::Result<u64> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let before = state.conflicts.len();
        state.conflicts.retain(|c| !c.is_resolved());
        Ok((before - state.conflicts.len()) as u64)
    }
}
