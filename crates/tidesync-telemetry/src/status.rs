//! Observable sync status
//!
//! [`StatusAggregator`] owns the current [`SyncStatus`] and the running
//! metric accumulators. Every change goes through [`StatusAggregator::update`]
//! or one of the `record_*` helpers, after which all subscribers are called
//! synchronously with a copy of the new status.
//!
//! Callbacks run on the thread that made the change, outside any internal
//! lock, so a callback may safely read the status or unsubscribe.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tidesync_core::domain::SyncStatus;

/// Observer invoked after every status change
pub type StatusCallback = Arc<dyn Fn(&SyncStatus) + Send + Sync>;

#[derive(Default)]
struct Accumulators {
    compressed_payloads: u64,
    ratio_sum: f64,
    cycles: u64,
    cycle_ms_sum: f64,
}

struct Inner {
    status: Mutex<SyncStatus>,
    accumulators: Mutex<Accumulators>,
    subscribers: Mutex<Vec<(u64, StatusCallback)>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, cloneable handle to the status read model
#[derive(Clone)]
pub struct StatusAggregator {
    inner: Arc<Inner>,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                status: Mutex::new(SyncStatus::default()),
                accumulators: Mutex::new(Accumulators::default()),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Returns a copy of the current status
    pub fn snapshot(&self) -> SyncStatus {
        lock(&self.inner.status).clone()
    }

    /// Applies `change` to the status and notifies subscribers
    pub fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut SyncStatus),
    {
        let snapshot = {
            let mut status = lock(&self.inner.status);
            change(&mut status);
            status.clone()
        };
        self.notify(&snapshot);
    }

    /// Registers `callback`; it stays registered until the returned
    /// [`Subscription`] is unsubscribed
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.subscribers).push((id, Arc::new(callback)));
        tracing::trace!(subscription = id, "Status subscriber added");
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    fn notify(&self, status: &SyncStatus) {
        let callbacks: Vec<StatusCallback> = lock(&self.inner.subscribers)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(status);
        }
    }

    // ========================================================================
    // Metric accumulation
    // ========================================================================

    /// Counts one dispatch attempt; `bytes` is the uncompressed payload
    /// size delivered on success
    pub fn record_dispatch(&self, success: bool, bytes: u64) {
        self.update(|status| {
            let metrics = &mut status.metrics;
            metrics.total_syncs += 1;
            if success {
                metrics.successful_syncs += 1;
                metrics.data_transferred += bytes;
            } else {
                metrics.failed_syncs += 1;
            }
        });
    }

    /// Folds one compressed payload's ratio into the running mean
    pub fn record_compression(&self, ratio: f64) {
        let mean = {
            let mut acc = lock(&self.inner.accumulators);
            acc.compressed_payloads += 1;
            acc.ratio_sum += ratio;
            acc.ratio_sum / acc.compressed_payloads as f64
        };
        self.update(|status| status.metrics.compression_ratio = mean);
    }

    /// Folds one completed cycle's duration into the running mean
    pub fn record_cycle(&self, duration: Duration) {
        let mean = {
            let mut acc = lock(&self.inner.accumulators);
            acc.cycles += 1;
            acc.cycle_ms_sum += duration.as_secs_f64() * 1000.0;
            acc.cycle_ms_sum / acc.cycles as f64
        };
        self.update(|status| status.metrics.average_sync_time_ms = mean);
    }
}

impl Default for StatusAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`StatusAggregator::subscribe`]
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the callback; later status changes are no longer delivered
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.subscribers).retain(|(id, _)| *id != self.id);
            tracing::trace!(subscription = self.id, "Status subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tidesync_core::domain::WorkerPhase;

    use super::*;

    #[test]
    fn test_update_notifies_subscribers() {
        let aggregator = StatusAggregator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = aggregator.subscribe(move |status| {
            seen_clone.lock().unwrap().push(status.queue_size);
        });

        aggregator.update(|s| s.queue_size = 3);
        aggregator.update(|s| s.queue_size = 2);

        assert_eq!(*seen.lock().unwrap(), vec![3, 2]);
        assert_eq!(aggregator.snapshot().queue_size, 2);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let aggregator = StatusAggregator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let sub = aggregator.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        aggregator.update(|s| s.phase = WorkerPhase::Dispatching);
        sub.unsubscribe();
        aggregator.update(|s| s.phase = WorkerPhase::Idle);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(aggregator.subscriber_count(), 0);
    }

    #[test]
    fn test_callback_can_read_status() {
        let aggregator = StatusAggregator::new();
        let reader = aggregator.clone();
        let observed = Arc::new(AtomicUsize::new(0));
        let observed_clone = observed.clone();
        let _sub = aggregator.subscribe(move |_| {
            observed_clone.store(reader.snapshot().queue_size, Ordering::SeqCst);
        });

        aggregator.update(|s| s.queue_size = 9);
        assert_eq!(observed.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn test_record_dispatch_counts() {
        let aggregator = StatusAggregator::new();
        aggregator.record_dispatch(true, 100);
        aggregator.record_dispatch(false, 50);
        aggregator.record_dispatch(true, 25);

        let metrics = aggregator.snapshot().metrics;
        assert_eq!(metrics.total_syncs, 3);
        assert_eq!(metrics.successful_syncs, 2);
        assert_eq!(metrics.failed_syncs, 1);
        assert_eq!(metrics.data_transferred, 125);
    }

    #[test]
    fn test_running_means() {
        let aggregator = StatusAggregator::new();
        aggregator.record_compression(0.5);
        aggregator.record_compression(0.7);
        aggregator.record_cycle(Duration::from_millis(10));
        aggregator.record_cycle(Duration::from_millis(30));

        let metrics = aggregator.snapshot().metrics;
        assert!((metrics.compression_ratio - 0.6).abs() < 1e-9);
        assert!((metrics.average_sync_time_ms - 20.0).abs() < 1e-9);
    }
}
