//! TideSync Daemon - background synchronization service
//!
//! Runs as a user service and handles:
//! - Draining the durable mutation queue to the remote store
//! - Connectivity probing and reconnect-triggered syncs
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon opens the SQLite queue store, restores the engine's state
//! and starts its scheduler. A `CancellationToken` triggered on SIGTERM
//! or SIGINT stops the probe, after which the engine is stopped and the
//! database closed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tidesync_cache::{DatabasePool, SqliteQueueStore};
use tidesync_core::config::Config;
use tidesync_core::ports::IRemoteStore;
use tidesync_remote::HttpRemoteStore;
use tidesync_sync::{ConnectivityMonitor, SyncEngine, SyncError};
use tidesync_telemetry::MetricsRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Overrides the configuration file location
const CONFIG_ENV: &str = "TIDESYNC_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the engine and the resources it runs on
struct DaemonService {
    config: Config,
    db_pool: DatabasePool,
    engine: SyncEngine,
    remote: Arc<dyn IRemoteStore>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the database and wires the engine to its adapters
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_path = config.storage.database.clone();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let db_pool = DatabasePool::new(&db_path)
            .await
            .context("Failed to open queue database")?;
        info!(path = %db_path.display(), "Queue database opened");

        let store = Arc::new(SqliteQueueStore::new(db_pool.pool().clone()));
        let remote: Arc<dyn IRemoteStore> = Arc::new(
            HttpRemoteStore::new(&config.remote).context("Failed to create remote store client")?,
        );
        let metrics = Arc::new(MetricsRegistry::new().context("Failed to create metrics")?);

        let engine = SyncEngine::builder(config.clone(), Arc::clone(&remote), store.clone())
            .audit_sink(store)
            .metrics(metrics)
            .connectivity(ConnectivityMonitor::new(true))
            .build();

        Ok(Self {
            config,
            db_pool,
            engine,
            remote,
            shutdown,
        })
    }

    /// Runs until the shutdown token fires
    async fn run(&self) -> Result<()> {
        let restored = self.engine.restore().await;
        info!(restored, "Sync queue restored");

        let probe = self.engine.connectivity().spawn_probe(
            Arc::clone(&self.remote),
            self.config.remote.probe_interval(),
            self.shutdown.clone(),
        );

        let _subscription = self.engine.subscribe(|status| {
            debug!(
                phase = ?status.phase,
                queue_size = status.queue_size,
                online = status.is_online,
                conflicts = status.unresolved_conflicts,
                quarantined = status.quarantine_count,
                "Sync status changed"
            );
        });

        match self.engine.start() {
            Ok(()) => info!(
                interval_secs = self.config.sync.interval,
                "Background sync started"
            ),
            Err(SyncError::Disabled) => {
                warn!("Background sync disabled by configuration, waiting for shutdown")
            }
            Err(e) => return Err(e).context("Failed to start sync engine"),
        }

        self.shutdown.cancelled().await;
        info!("Shutdown requested, stopping sync");

        self.engine.stop().await;
        if let Err(e) = probe.await {
            warn!(error = %e, "Connectivity probe ended abnormally");
        }

        let status = self.engine.status();
        info!(
            pending = status.queue_size,
            quarantined = status.quarantine_count,
            conflicts = status.unresolved_conflicts,
            "Sync stopped"
        );

        if let Some(metrics) = self.engine.metrics() {
            match metrics.encode() {
                Ok(text) => debug!(metrics = %text, "Final metrics"),
                Err(e) => warn!(error = %e, "Failed to encode metrics"),
            }
        }

        self.db_pool.close().await;
        Ok(())
    }
}

// ============================================================================
// Startup helpers
// ============================================================================

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

/// Loads configuration, falling back to defaults when the file is missing
/// or invalid; validation problems are logged and left to the defaults
fn load_config(path: &std::path::Path) -> Config {
    let config = match Config::load(path) {
        Ok(config) => {
            info!(config_path = %path.display(), "Loaded configuration");
            config
        }
        Err(e) => {
            warn!(config_path = %path.display(), error = %e, "Using default configuration");
            Config::default()
        }
    };

    let problems = config.validate();
    if problems.is_empty() {
        return config;
    }
    for problem in &problems {
        error!(%problem, "Invalid configuration value");
    }
    warn!(count = problems.len(), "Configuration invalid, using defaults");
    Config::default()
}

/// Waits for SIGINT or SIGTERM, then cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let file_level = Config::load(&path)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&file_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!("TideSync daemon starting (tidesyncd)");

    let config = load_config(&path);

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("TideSync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "TideSync daemon exiting with error"),
    }

    result
}
