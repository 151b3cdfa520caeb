//! Connectivity monitor
//!
//! Tracks whether the remote store is believed reachable. The state is
//! flipped offline by the worker when a dispatch reports the remote
//! unavailable, and by the reachability probe in either direction.
//! Subscribers receive every transition through a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tidesync_core::ports::IRemoteStore;

/// Shared online/offline flag
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records the current state; returns true if it changed
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "Connectivity changed");
        }
        changed
    }

    /// Receiver that observes every transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Periodically asks `remote` whether it is reachable until `cancel` fires
    pub fn spawn_probe(
        &self,
        remote: Arc<dyn IRemoteStore>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            debug!(interval_secs = interval.as_secs(), "Connectivity probe started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let reachable = remote.is_reachable().await;
                        monitor.set_online(reachable);
                    }
                }
            }

            debug!("Connectivity probe stopped");
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tidesync_core::domain::EntityKey;
    use tidesync_core::ports::{RemoteRecord, RemoteResult};

    use super::*;

    struct ToggleRemote {
        reachable: AtomicBool,
    }

    #[async_trait]
    impl IRemoteStore for ToggleRemote {
        async fn create(&self, _: &EntityKey, _: &[u8]) -> RemoteResult<()> {
            Ok(())
        }
        async fn update(&self, _: &EntityKey, _: &[u8]) -> RemoteResult<()> {
            Ok(())
        }
        async fn delete(&self, _: &EntityKey) -> RemoteResult<()> {
            Ok(())
        }
        async fn bulk_insert(&self, _: &EntityKey, _: &[u8]) -> RemoteResult<()> {
            Ok(())
        }
        async fn get_current_state(&self, _: &EntityKey) -> RemoteResult<Option<RemoteRecord>> {
            Ok(None)
        }
        async fn is_reachable(&self) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_set_online_reports_changes_only() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));
        assert!(!monitor.is_online());
        assert!(monitor.set_online(true));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_probe_follows_remote() {
        let remote = Arc::new(ToggleRemote {
            reachable: AtomicBool::new(false),
        });
        let monitor = ConnectivityMonitor::new(true);
        let mut rx = monitor.subscribe();
        let cancel = CancellationToken::new();
        let handle = monitor.spawn_probe(remote.clone(), Duration::from_millis(10), cancel.clone());

        rx.changed().await.unwrap();
        assert!(!monitor.is_online());

        remote.reachable.store(true, Ordering::SeqCst);
        rx.changed().await.unwrap();
        assert!(monitor.is_online());

        cancel.cancel();
        handle.await.unwrap();
    }
}
