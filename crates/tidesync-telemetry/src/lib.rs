//! TideSync Telemetry - Status and metrics
//!
//! Provides:
//! - `StatusAggregator`: the observable `SyncStatus` read model with
//!   change subscriptions and accumulated `SyncMetrics`
//! - `MetricsRegistry`: Prometheus counters, gauges and histograms

pub mod metrics;
pub mod status;

pub use metrics::MetricsRegistry;
pub use status::{StatusAggregator, StatusCallback, Subscription};
