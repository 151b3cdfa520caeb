//! Sync scheduler - turns time and connectivity into sync cycles
//!
//! The [`SyncScheduler`] runs as one background task per started engine.
//! It triggers a cycle on every interval tick and immediately whenever
//! connectivity comes back after an outage.
//!
//! ## Flow
//!
//! ```text
//! interval tick ──────────┐
//!                         ├──→ SyncEngine::run_cycle
//! offline → online ───────┘
//! cancellation ──────────────→ loop exits
//! ```

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{deadline_after, SyncEngine};
use crate::SyncError;

/// Drives an engine's cycles until cancelled
pub struct SyncScheduler {
    engine: SyncEngine,
    interval: Duration,
    cancel: CancellationToken,
    /// Subscribed at construction so no transition after `start` is missed
    connectivity: watch::Receiver<bool>,
}

impl SyncScheduler {
    pub fn new(engine: SyncEngine, interval: Duration, cancel: CancellationToken) -> Self {
        let connectivity = engine.connectivity().subscribe();
        Self {
            engine,
            interval,
            cancel,
            connectivity,
        }
    }

    /// Main loop
    ///
    /// The first tick fires one interval after start. Offline ticks and
    /// ticks that overlap a running cycle are skipped.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Sync scheduler starting");

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut was_online = *self.connectivity.borrow_and_update();
        let mut watching = true;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Sync scheduler cancelled");
                    break;
                }

                _ = ticker.tick() => {
                    self.trigger("timer").await;
                    let next = deadline_after(self.interval);
                    self.engine
                        .status_aggregator()
                        .update(|s| s.next_sync = Some(next));
                }

                changed = self.connectivity.changed(), if watching => {
                    if changed.is_err() {
                        warn!("Connectivity channel closed, continuing on timer only");
                        watching = false;
                        continue;
                    }
                    let online = *self.connectivity.borrow_and_update();
                    self.engine
                        .status_aggregator()
                        .update(|s| s.is_online = online);
                    if online && !was_online {
                        info!("Connectivity restored, syncing now");
                        self.trigger("reconnect").await;
                    }
                    was_online = online;
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    async fn trigger(&self, reason: &'static str) {
        match self.engine.run_cycle(&self.cancel).await {
            Ok(report) => debug!(
                reason,
                settled = report.settled(),
                deferred = report.deferred,
                "Scheduled cycle finished"
            ),
            Err(SyncError::Offline) => debug!(reason, "Offline, skipping cycle"),
            Err(SyncError::CycleInProgress) => debug!(reason, "Cycle already running, skipping"),
            Err(e) => warn!(reason, error = %e, "Scheduled cycle failed"),
        }
    }
}
