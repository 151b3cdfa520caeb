//! Sync engine - drains the queue against the remote store
//!
//! The [`SyncEngine`] owns the durable queue, the conflict registry, the
//! quarantine list and the status read model. Producers hand it
//! [`Mutation`]s; a background [`SyncScheduler`](crate::scheduler::SyncScheduler)
//! or an explicit [`SyncEngine::force_sync`] runs dispatch cycles.
//!
//! ## Sync Flow
//!
//! 1. **Check connectivity**: an offline engine does not start a cycle
//! 2. **Drain**: take up to `batch_size` due items whose entity has no
//!    open conflict, highest priority first
//! 3. **Dispatch** each item in order:
//!    - success: commit the item, update metrics
//!    - remote unavailable: go offline, return the item and the rest of
//!      the batch to the queue untouched
//!    - rejected: fetch the remote state and run conflict detection.
//!      A conflict holds the item together with every later item of the
//!      batch for the same entity; an already-applied mutation counts as
//!      success; anything else is retried with backoff, or quarantined
//!      once the retry budget is spent
//!
//! [`SyncEngine::stop`] returns only after the running cycle, forced or
//! scheduled, has put its undispatched items back.
//!
//! Only one cycle runs at a time. A second trigger while a cycle is active
//! is refused rather than queued.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tidesync_audit::{AuditLogger, ReasonCode, TracingAuditSink};
use tidesync_codec::CompressionCodec;
use tidesync_conflict::{ConflictDetector, ConflictRegistry, DetectionResult, PolicyEngine};
use tidesync_core::config::{Config, SyncConfig};
use tidesync_core::domain::{
    ConflictId, EntityKey, Mutation, OperationType, Priority, QuarantineRecord, QueueItemId,
    ResolutionSource, ResolutionStrategy, SyncConflict, SyncQueueItem, SyncStatus, WorkerPhase,
    QUARANTINE_CAPACITY,
};
use tidesync_core::ports::{IAuditSink, IQueueStore, IRemoteStore, RemoteError};
use tidesync_telemetry::{MetricsRegistry, StatusAggregator, Subscription};

use crate::backoff::RetryPolicy;
use crate::connectivity::ConnectivityMonitor;
use crate::queue::SyncQueue;
use crate::scheduler::SyncScheduler;
use crate::SyncError;

// ============================================================================
// Outcomes
// ============================================================================

/// Terminal state of one dispatched item within a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The remote accepted the mutation (or already reflected it)
    Success,
    /// The attempt failed; the item waits `delay` before the next one
    RetryScheduled { delay: Duration },
    /// The retry budget is spent; the item left the queue
    Quarantined,
    /// The item diverged from the remote and is held until resolved
    ConflictPending(ConflictId),
}

/// Summary of one dispatch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dispatched: usize,
    pub retried: usize,
    pub quarantined: usize,
    pub conflicted: usize,
    /// Items returned to the queue without an attempt being counted
    pub deferred: usize,
    /// True if the cycle stopped early because of cancellation
    pub cancelled: bool,
    pub duration: Duration,
}

impl CycleReport {
    /// Number of items that reached a dispatch outcome
    pub fn settled(&self) -> usize {
        self.dispatched + self.retried + self.quarantined + self.conflicted
    }

    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Success => self.dispatched += 1,
            DispatchOutcome::RetryScheduled { .. } => self.retried += 1,
            DispatchOutcome::Quarantined => self.quarantined += 1,
            DispatchOutcome::ConflictPending(_) => self.conflicted += 1,
        }
    }
}

/// Result of a single dispatch attempt
enum Attempt {
    Settled(DispatchOutcome),
    /// The remote was unavailable; the item is handed back untouched
    Deferred(Box<SyncQueueItem>),
    /// The item diverged from the remote and must be held with its entity
    Conflicted {
        item: Box<SyncQueueItem>,
        conflict: Box<SyncConflict>,
    },
}

// ============================================================================
// Single-flight guard
// ============================================================================

/// Holds the cycle flag for the lifetime of a cycle; dropping it wakes
/// everyone waiting in [`wait_cycle_idle`]
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
    idle: &'a Notify,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool, idle: &'a Notify) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, idle })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.idle.notify_waiters();
    }
}

/// Returns once no cycle holds `flag`
async fn wait_cycle_idle(flag: &AtomicBool, idle: &Notify) {
    loop {
        let notified = idle.notified();
        tokio::pin!(notified);
        // Register before checking so a guard dropped in between is not missed
        notified.as_mut().enable();
        if !flag.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

struct Runner {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct EngineInner {
    config: SyncConfig,
    compression_threshold: usize,
    retry: RetryPolicy,
    default_priority: Priority,

    queue: SyncQueue,
    store: Arc<dyn IQueueStore>,
    remote: Arc<dyn IRemoteStore>,
    codec: CompressionCodec,

    policy: PolicyEngine,
    /// Lock order: `conflicts` before any queue operation
    conflicts: Mutex<ConflictRegistry>,
    /// Most recent first
    quarantine: Mutex<Vec<QuarantineRecord>>,

    connectivity: ConnectivityMonitor,
    status: StatusAggregator,
    metrics: Option<Arc<MetricsRegistry>>,
    audit: AuditLogger,

    cycle_running: AtomicBool,
    cycle_idle: Notify,
    /// Set while a quarantine or conflict write is failing
    side_store_degraded: AtomicBool,
    runner: StdMutex<Option<Runner>>,
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes every item for `entity` from `pending`, keeping both sides in order
fn take_entity(pending: &mut VecDeque<SyncQueueItem>, entity: &EntityKey) -> Vec<SyncQueueItem> {
    let (taken, kept): (Vec<_>, Vec<_>) = pending
        .drain(..)
        .partition(|queued| queued.entity() == entity);
    *pending = VecDeque::from(kept);
    taken
}

/// Background sync engine
///
/// Cheap to clone; clones share the same queue and state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

/// Builder for [`SyncEngine`]
///
/// The remote and the queue store are required; audit defaults to the
/// tracing sink, connectivity starts online and metrics are optional.
pub struct SyncEngineBuilder {
    config: Config,
    remote: Arc<dyn IRemoteStore>,
    store: Arc<dyn IQueueStore>,
    audit_sink: Option<Arc<dyn IAuditSink>>,
    metrics: Option<Arc<MetricsRegistry>>,
    connectivity: Option<ConnectivityMonitor>,
}

impl SyncEngineBuilder {
    pub fn audit_sink(mut self, sink: Arc<dyn IAuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn connectivity(mut self, monitor: ConnectivityMonitor) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    pub fn build(self) -> SyncEngine {
        let config = self.config;
        let audit_sink = self
            .audit_sink
            .unwrap_or_else(|| Arc::new(TracingAuditSink::new()));
        let connectivity = self.connectivity.unwrap_or_default();

        let status = StatusAggregator::new();
        let online = connectivity.is_online();
        status.update(|s| s.is_online = online);

        info!(
            enabled = config.sync.enabled,
            interval_secs = config.sync.interval,
            batch_size = config.sync.batch_size,
            max_retries = config.sync.max_retries,
            compression = config.compression.enabled,
            "Sync engine created"
        );

        SyncEngine {
            inner: Arc::new(EngineInner {
                retry: RetryPolicy::from_config(&config.sync),
                default_priority: config.sync.default_priority(),
                compression_threshold: config.compression.threshold_bytes,
                codec: CompressionCodec::from_config(&config.compression),
                policy: PolicyEngine::from_config(&config.conflicts),
                config: config.sync,
                queue: SyncQueue::new(Arc::clone(&self.store)),
                store: self.store,
                remote: self.remote,
                conflicts: Mutex::new(ConflictRegistry::new()),
                quarantine: Mutex::new(Vec::new()),
                connectivity,
                status,
                metrics: self.metrics,
                audit: AuditLogger::new(audit_sink),
                cycle_running: AtomicBool::new(false),
                cycle_idle: Notify::new(),
                side_store_degraded: AtomicBool::new(false),
                runner: StdMutex::new(None),
            }),
        }
    }
}

impl SyncEngine {
    pub fn builder(
        config: Config,
        remote: Arc<dyn IRemoteStore>,
        store: Arc<dyn IQueueStore>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder {
            config,
            remote,
            store,
            audit_sink: None,
            metrics: None,
            connectivity: None,
        }
    }

    // ========================================================================
    // Startup and producer API
    // ========================================================================

    /// Loads the persisted queue, quarantine and conflicts
    ///
    /// Call once before [`SyncEngine::start`]. Unreadable records are
    /// logged and treated as empty. Returns the number of restored items.
    pub async fn restore(&self) -> usize {
        let restored = self.inner.queue.restore().await;

        match self.inner.store.load_quarantine().await {
            Ok(mut records) => {
                records.truncate(QUARANTINE_CAPACITY);
                *self.inner.quarantine.lock().await = records;
            }
            Err(e) => warn!(error = %e, "Failed to load quarantine, starting empty"),
        }

        match self.inner.store.load_conflicts().await {
            Ok(conflicts) => {
                *self.inner.conflicts.lock().await = ConflictRegistry::from_conflicts(conflicts);
            }
            Err(e) => warn!(error = %e, "Failed to load conflicts, starting empty"),
        }

        self.refresh_counts().await;
        restored
    }

    /// Queues a mutation for dispatch and returns its id
    ///
    /// Large payloads are compressed before they enter the queue. Never
    /// fails: a persistence error leaves the item queued in memory.
    pub async fn enqueue(&self, mutation: Mutation) -> QueueItemId {
        let mut item = SyncQueueItem::from_mutation(mutation, self.inner.default_priority);
        self.compress_payload(&mut item).await;

        let id = self.inner.queue.enqueue(item).await;
        self.refresh_counts().await;
        id
    }

    async fn compress_payload(&self, item: &mut SyncQueueItem) {
        let codec = &self.inner.codec;
        if !codec.is_enabled() || item.payload().len() < self.inner.compression_threshold {
            return;
        }

        match codec.compress(item.payload().to_vec()).await {
            Ok((compressed, stats)) if stats.is_beneficial() => {
                item.set_compressed_payload(compressed);
                self.inner.status.record_compression(stats.compression_ratio);
            }
            Ok(_) => debug!(entity = %item.entity(), "Compression not beneficial, storing raw"),
            Err(e) => warn!(
                entity = %item.entity(),
                error = %e,
                "Compression failed, storing payload uncompressed"
            ),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts the background scheduler
    ///
    /// Starting an already running engine is a no-op.
    ///
    /// # Errors
    ///
    /// [`SyncError::Disabled`] if `sync.enabled` is false.
    pub fn start(&self) -> Result<(), SyncError> {
        if !self.inner.config.enabled {
            return Err(SyncError::Disabled);
        }

        let mut runner = lock(&self.inner.runner);
        if runner.is_some() {
            debug!("Sync engine already running");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let scheduler = SyncScheduler::new(self.clone(), self.interval(), cancel.clone());
        let handle = tokio::spawn(scheduler.run());
        *runner = Some(Runner { cancel, handle });
        drop(runner);

        let next = deadline_after(self.interval());
        self.inner.status.update(|s| {
            s.is_active = true;
            s.next_sync = Some(next);
        });
        info!("Sync engine started");
        Ok(())
    }

    /// Stops the scheduler
    ///
    /// An item already being dispatched completes; the rest of its batch
    /// goes back to the queue unchanged. This also covers a cycle started
    /// by [`SyncEngine::force_sync`] while the scheduler was running: the
    /// call returns only once that cycle has finished.
    pub async fn stop(&self) {
        let runner = lock(&self.inner.runner).take();
        let Some(runner) = runner else {
            return;
        };

        runner.cancel.cancel();
        if let Err(e) = runner.handle.await {
            warn!(error = %e, "Sync scheduler task ended abnormally");
        }
        if self.inner.cycle_running.load(Ordering::Acquire) {
            debug!("Waiting for the running cycle to finish");
        }
        wait_cycle_idle(&self.inner.cycle_running, &self.inner.cycle_idle).await;

        self.inner.status.update(|s| {
            s.is_active = false;
            s.next_sync = None;
        });
        info!("Sync engine stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.runner).is_some()
    }

    /// Runs one cycle now
    ///
    /// Returns false without doing anything when offline or when a cycle is
    /// already running.
    pub async fn force_sync(&self) -> bool {
        let cancel = self.cycle_token();
        match self.run_cycle(&cancel).await {
            Ok(report) => {
                debug!(settled = report.settled(), "Forced sync finished");
                true
            }
            Err(e) => {
                debug!(reason = %e, "Forced sync refused");
                false
            }
        }
    }

    /// Token of the running scheduler, or a fresh one when stopped
    fn cycle_token(&self) -> CancellationToken {
        lock(&self.inner.runner)
            .as_ref()
            .map(|r| r.cancel.clone())
            .unwrap_or_default()
    }

    pub(crate) fn interval(&self) -> Duration {
        self.inner.config.interval()
    }

    pub(crate) fn status_aggregator(&self) -> &StatusAggregator {
        &self.inner.status
    }

    // ========================================================================
    // Dispatch cycle
    // ========================================================================

    /// Runs one dispatch cycle
    ///
    /// `cancel` is checked before each item; a cancelled cycle returns the
    /// undispatched part of its batch to the queue.
    ///
    /// # Errors
    ///
    /// - [`SyncError::CycleInProgress`] if another cycle holds the guard
    /// - [`SyncError::Offline`] if connectivity is down
    #[tracing::instrument(skip(self, cancel))]
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, SyncError> {
        let Some(_guard) = CycleGuard::acquire(&self.inner.cycle_running, &self.inner.cycle_idle)
        else {
            return Err(SyncError::CycleInProgress);
        };

        self.set_phase(WorkerPhase::CheckingConnectivity);
        if !self.inner.connectivity.is_online() {
            self.inner.status.update(|s| {
                s.phase = WorkerPhase::Idle;
                s.is_online = false;
            });
            return Err(SyncError::Offline);
        }

        let started = Instant::now();
        self.inner.status.update(|s| {
            s.sync_in_progress = true;
            s.is_online = true;
            s.phase = WorkerPhase::DrainingBatch;
        });

        let blocked = self.inner.conflicts.lock().await.blocked_entities();
        let batch = self
            .inner
            .queue
            .dequeue_batch(self.inner.config.batch_size, Utc::now(), &blocked)
            .await;

        let mut report = CycleReport::default();
        let had_work = !batch.is_empty();
        if had_work {
            info!(batch = batch.len(), blocked = blocked.len(), "Sync cycle started");
            self.inner.audit.log_sync_start(batch.len()).await;
            self.set_phase(WorkerPhase::Dispatching);
            self.dispatch_batch(batch, cancel, &mut report).await;
        }

        report.duration = started.elapsed();
        self.inner.status.record_cycle(report.duration);
        if let Some(metrics) = &self.inner.metrics {
            let result = if report.cancelled { "cancelled" } else { "ok" };
            metrics.observe_cycle_duration(result, report.duration.as_secs_f64());
        }

        if had_work {
            self.inner
                .audit
                .log_sync_complete(
                    report.duration,
                    report.dispatched,
                    report.retried,
                    report.quarantined,
                    report.conflicted,
                )
                .await;
            info!(
                dispatched = report.dispatched,
                retried = report.retried,
                quarantined = report.quarantined,
                conflicted = report.conflicted,
                deferred = report.deferred,
                duration_ms = report.duration.as_millis() as u64,
                "Sync cycle complete"
            );
        }

        let finished = Utc::now();
        self.inner.status.update(|s| {
            s.sync_in_progress = false;
            s.phase = WorkerPhase::Idle;
            s.last_sync = Some(finished);
        });
        self.refresh_counts().await;

        Ok(report)
    }

    async fn dispatch_batch(
        &self,
        batch: Vec<SyncQueueItem>,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) {
        let mut pending: VecDeque<SyncQueueItem> = batch.into();

        while let Some(item) = pending.pop_front() {
            if cancel.is_cancelled() {
                pending.push_front(item);
                info!(returned = pending.len(), "Sync cycle cancelled");
                report.cancelled = true;
                report.deferred += pending.len();
                self.inner.queue.release(pending.into()).await;
                return;
            }

            match self.dispatch_item(item).await {
                Attempt::Settled(outcome) => report.record(&outcome),
                Attempt::Deferred(item) => {
                    pending.push_front(*item);
                    report.deferred += pending.len();
                    self.inner.queue.release(pending.into()).await;
                    return;
                }
                Attempt::Conflicted { item, conflict } => {
                    let followers = take_entity(&mut pending, item.entity());
                    report.deferred += followers.len();
                    let outcome = self.hold_conflict(*item, *conflict, followers).await;
                    report.record(&outcome);
                }
            }
        }
    }

    async fn dispatch_item(&self, item: SyncQueueItem) -> Attempt {
        let started = Instant::now();

        let payload = match self.decoded_payload(&item).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(item_id = %item.id(), error = %err, "Queued payload could not be decoded");
                self.inner
                    .audit
                    .log_error(
                        ReasonCode::DecompressionFailed,
                        &err.to_string(),
                        Some(item.entity().as_str()),
                    )
                    .await;
                return Attempt::Settled(self.handle_failure(item, err).await);
            }
        };

        let (status, message) = match self.send(&item, &payload).await {
            Ok(()) => return Attempt::Settled(self.complete(item, started).await),
            Err(RemoteError::Unavailable(reason)) => return self.defer(item, &reason),
            Err(RemoteError::Rejected { status, message }) => (status, message),
        };

        debug!(
            item_id = %item.id(),
            entity = %item.entity(),
            status,
            message = %message,
            "Dispatch rejected, checking remote state"
        );

        let remote = match self.inner.remote.get_current_state(item.entity()).await {
            Ok(remote) => remote,
            Err(RemoteError::Unavailable(reason)) => return self.defer(item, &reason),
            Err(e) => {
                warn!(entity = %item.entity(), error = %e, "Could not fetch remote state");
                let err = SyncError::RemoteRejected { status, message };
                return Attempt::Settled(self.handle_failure(item, err).await);
            }
        };

        let outcome = match ConflictDetector::detect(&item, &payload, remote.as_ref()) {
            DetectionResult::AlreadyApplied => self.complete(item, started).await,
            DetectionResult::Conflicted(conflict) => {
                return Attempt::Conflicted {
                    item: Box::new(item),
                    conflict,
                };
            }
            DetectionResult::NoConflict => {
                let err = SyncError::RemoteRejected { status, message };
                self.handle_failure(item, err).await
            }
        };
        Attempt::Settled(outcome)
    }

    async fn decoded_payload(&self, item: &SyncQueueItem) -> Result<Vec<u8>, SyncError> {
        if !item.is_compressed() {
            return Ok(item.payload().to_vec());
        }
        let payload = self
            .inner
            .codec
            .with_enabled(true)
            .decompress(item.payload().to_vec())
            .await?;
        Ok(payload)
    }

    async fn send(&self, item: &SyncQueueItem, payload: &[u8]) -> Result<(), RemoteError> {
        let remote = &self.inner.remote;
        let entity = item.entity();
        match item.operation() {
            OperationType::Create => remote.create(entity, payload).await,
            OperationType::Update => remote.update(entity, payload).await,
            OperationType::Delete => remote.delete(entity).await,
            OperationType::BulkInsert => remote.bulk_insert(entity, payload).await,
        }
    }

    fn defer(&self, item: SyncQueueItem, reason: &str) -> Attempt {
        let err = SyncError::NetworkUnavailable(reason.to_string());
        warn!(item_id = %item.id(), error = %err, "Remote unavailable, pausing dispatch");
        self.inner.connectivity.set_online(false);
        self.inner.status.update(|s| s.is_online = false);
        self.record_metric(&item, "deferred");
        Attempt::Deferred(Box::new(item))
    }

    async fn complete(&self, item: SyncQueueItem, started: Instant) -> DispatchOutcome {
        self.inner.queue.commit(item.id()).await;
        self.inner.status.record_dispatch(true, item.original_size());
        self.record_metric(&item, "success");
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_payload_bytes(item.original_size(), item.payload().len() as u64);
        }

        debug!(
            item_id = %item.id(),
            entity = %item.entity(),
            operation = %item.operation(),
            "Item dispatched"
        );
        self.inner
            .audit
            .log_item_dispatched(&item, started.elapsed())
            .await;
        DispatchOutcome::Success
    }

    async fn handle_failure(&self, mut item: SyncQueueItem, error: SyncError) -> DispatchOutcome {
        item.record_failure(error.to_string());
        self.inner.status.record_dispatch(false, 0);

        if self.inner.retry.is_exhausted(item.retry_count()) {
            let exhausted = SyncError::RetriesExhausted {
                attempts: item.retry_count(),
                last_error: error.to_string(),
            };
            warn!(
                item_id = %item.id(),
                entity = %item.entity(),
                error = %exhausted,
                "Item quarantined"
            );
            self.inner.queue.remove(item.id()).await;
            self.quarantine(QuarantineRecord::new(item.clone(), exhausted.to_string()))
                .await;
            self.record_metric(&item, "quarantined");
            self.inner
                .audit
                .log_item_quarantined(&item, &exhausted.to_string())
                .await;
            return DispatchOutcome::Quarantined;
        }

        let delay = self.inner.retry.delay_for(item.retry_count());
        item.demote_priority();
        item.schedule_retry(deadline_after(delay));

        debug!(
            item_id = %item.id(),
            retry_count = item.retry_count(),
            delay_ms = delay.as_millis() as u64,
            priority = %item.priority(),
            "Retry scheduled"
        );
        self.record_metric(&item, "retry");
        self.inner
            .audit
            .log_retry_scheduled(&item, delay, &error.to_string())
            .await;
        self.inner.queue.requeue(item).await;
        DispatchOutcome::RetryScheduled { delay }
    }

    async fn quarantine(&self, record: QuarantineRecord) {
        let result = self.inner.store.push_quarantine(&record).await;
        self.note_side_write(result, "quarantine");

        let mut quarantine = self.inner.quarantine.lock().await;
        quarantine.insert(0, record);
        quarantine.truncate(QUARANTINE_CAPACITY);
    }

    /// Records `conflict` and returns `item` and its `followers` (later
    /// batch items for the same entity) to the queue in their batch order
    async fn hold_conflict(
        &self,
        item: SyncQueueItem,
        conflict: SyncConflict,
        followers: Vec<SyncQueueItem>,
    ) -> DispatchOutcome {
        self.inner.status.record_dispatch(false, 0);
        self.record_metric(&item, "conflict");
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_conflict_detected(&conflict.conflict_type().to_string());
        }

        let conflict_id = *conflict.id();
        let err = SyncError::Conflict {
            entity: item.entity().to_string(),
        };
        warn!(
            item_id = %item.id(),
            conflict_id = %conflict_id,
            conflict_type = %conflict.conflict_type(),
            held_with = followers.len(),
            error = %err,
            "Item held until the conflict is resolved"
        );
        {
            let mut registry = self.inner.conflicts.lock().await;
            let result = self.inner.store.save_conflict(&conflict).await;
            self.note_side_write(result, "conflict");
            registry.record(conflict.clone());
            let held: Vec<_> = std::iter::once(item).chain(followers).collect();
            self.inner.queue.release(held).await;
        }
        self.inner.audit.log_conflict_detected(&conflict).await;

        if let Some(strategy) = ConflictDetector::should_auto_resolve(&conflict, &self.inner.policy)
        {
            if let Err(e) = self
                .apply_resolution(&conflict_id, strategy, ResolutionSource::Policy)
                .await
            {
                warn!(conflict_id = %conflict_id, error = %e, "Automatic resolution failed");
            }
        }

        DispatchOutcome::ConflictPending(conflict_id)
    }

    // ========================================================================
    // Conflicts
    // ========================================================================

    /// All known conflicts, resolved ones included, in detection order
    pub async fn conflicts(&self) -> Vec<SyncConflict> {
        self.inner.conflicts.lock().await.all().to_vec()
    }

    /// Resolves a conflict on behalf of the user
    ///
    /// - `PreferLocal`: the held item overwrites the remote on its next dispatch
    /// - `PreferRemote`: the held item is discarded
    /// - `Merge(payload)`: the held item is rewritten with `payload` and
    ///   overwrites the remote
    ///
    /// # Errors
    ///
    /// [`SyncError::Resolution`] if the id is unknown or already resolved.
    pub async fn resolve_conflict(
        &self,
        id: &ConflictId,
        strategy: ResolutionStrategy,
    ) -> Result<SyncConflict, SyncError> {
        self.apply_resolution(id, strategy, ResolutionSource::User)
            .await
    }

    async fn apply_resolution(
        &self,
        id: &ConflictId,
        strategy: ResolutionStrategy,
        source: ResolutionSource,
    ) -> Result<SyncConflict, SyncError> {
        let resolved = {
            let mut registry = self.inner.conflicts.lock().await;
            let resolved = registry.resolve(id, strategy.clone(), source)?;
            let item_id = *resolved.item_id();
            let remote_marker = resolved.remote_marker();

            let found = match strategy.clone() {
                ResolutionStrategy::PreferLocal => {
                    self.inner
                        .queue
                        .modify(&item_id, |item| item.overwrite_remote(remote_marker))
                        .await
                }
                ResolutionStrategy::PreferRemote => {
                    self.inner.queue.remove(&item_id).await.is_some()
                }
                ResolutionStrategy::Merge(payload) => {
                    self.inner
                        .queue
                        .modify(&item_id, move |item| {
                            item.replace_payload(payload);
                            item.overwrite_remote(remote_marker);
                        })
                        .await
                }
            };
            if !found {
                debug!(item_id = %item_id, "Conflicting item is no longer queued");
            }

            let result = self.inner.store.save_conflict(&resolved).await;
            self.note_side_write(result, "conflict");
            resolved
        };

        if let Some(metrics) = &self.inner.metrics {
            metrics.record_conflict_resolved(strategy.name());
        }
        self.inner.audit.log_conflict_resolved(&resolved).await;
        self.refresh_counts().await;
        Ok(resolved)
    }

    /// Forgets resolved conflicts and returns how many were dropped
    pub async fn clear_resolved_conflicts(&self) -> usize {
        let removed = self.inner.conflicts.lock().await.clear_resolved();
        let result = self.inner.store.delete_resolved_conflicts().await.map(|_| ());
        self.note_side_write(result, "conflict cleanup");
        self.refresh_counts().await;
        removed
    }

    // ========================================================================
    // Status API
    // ========================================================================

    pub fn status(&self) -> SyncStatus {
        self.inner.status.snapshot()
    }

    /// Registers a callback invoked after every status change
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.inner.status.subscribe(callback)
    }

    /// Quarantined items, most recent first
    pub async fn quarantined(&self) -> Vec<QuarantineRecord> {
        self.inner.quarantine.lock().await.clone()
    }

    /// Copy of the queue in dispatch order
    pub async fn queued_items(&self) -> Vec<SyncQueueItem> {
        self.inner.queue.items().await
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.connectivity
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsRegistry>> {
        self.inner.metrics.as_ref()
    }

    fn set_phase(&self, phase: WorkerPhase) {
        self.inner.status.update(|s| s.phase = phase);
    }

    fn record_metric(&self, item: &SyncQueueItem, outcome: &str) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_dispatch(&item.operation().to_string(), outcome);
        }
    }

    fn note_side_write(&self, result: anyhow::Result<()>, what: &str) {
        match result {
            Ok(()) => {
                self.inner.side_store_degraded.store(false, Ordering::Release);
            }
            Err(e) => {
                warn!(error = %e, record = what, "Failed to persist record, keeping it in memory");
                self.inner.side_store_degraded.store(true, Ordering::Release);
            }
        }
    }

    /// Pushes queue, quarantine and conflict counts to status and metrics
    async fn refresh_counts(&self) {
        let queue_size = self.inner.queue.len().await;
        let unresolved = self.inner.conflicts.lock().await.unresolved_count();
        let quarantined = self.inner.quarantine.lock().await.len();
        let degraded = self.inner.queue.is_degraded()
            || self.inner.side_store_degraded.load(Ordering::Acquire);
        let online = self.inner.connectivity.is_online();

        self.inner.status.update(|s| {
            s.queue_size = queue_size;
            s.unresolved_conflicts = unresolved;
            s.quarantine_count = quarantined;
            s.persistence_degraded = degraded;
            s.is_online = online;
        });
        if let Some(metrics) = &self.inner.metrics {
            metrics.set_queue_items(queue_size, quarantined, unresolved);
        }
    }
}

/// Wall-clock instant `delay` from now, saturating at the maximum date
pub(crate) fn deadline_after(delay: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
