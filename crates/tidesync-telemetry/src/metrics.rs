//! Prometheus metrics registry for TideSync
//!
//! Labeled counters, gauges, and histograms for queue depth, dispatch
//! outcomes, payload bytes, conflicts and cycle duration.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Gauge: items per bucket (queued, quarantined, conflicts)
    pub queue_items: IntGaugeVec,
    /// Counter: dispatch attempts by (operation, outcome)
    pub dispatch_total: IntCounterVec,
    /// Counter: payload bytes by kind (original, stored)
    pub payload_bytes_total: IntCounterVec,
    /// Counter: conflicts by event (detected, resolved) and kind
    pub conflicts_total: IntCounterVec,
    /// Histogram: dispatch cycle duration in seconds
    pub cycle_duration_seconds: HistogramVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("tidesync".to_string()), None)?;

        let queue_items = IntGaugeVec::new(
            Opts::new("queue_items", "Number of items held by the engine"),
            &["bucket"],
        )?;
        registry.register(Box::new(queue_items.clone()))?;

        let dispatch_total = IntCounterVec::new(
            Opts::new("dispatch_total", "Dispatch attempts by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(dispatch_total.clone()))?;

        let payload_bytes_total = IntCounterVec::new(
            Opts::new("payload_bytes_total", "Payload bytes delivered"),
            &["kind"],
        )?;
        registry.register(Box::new(payload_bytes_total.clone()))?;

        let conflicts_total = IntCounterVec::new(
            Opts::new("conflicts_total", "Conflicts detected and resolved"),
            &["event", "kind"],
        )?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let cycle_duration_seconds = HistogramVec::new(
            HistogramOpts::new("cycle_duration_seconds", "Dispatch cycle duration in seconds")
                .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, f64::INFINITY]),
            &["result"],
        )?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            queue_items,
            dispatch_total,
            payload_bytes_total,
            conflicts_total,
            cycle_duration_seconds,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record a dispatch attempt outcome.
    pub fn record_dispatch(&self, operation: &str, outcome: &str) {
        self.dispatch_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Record a delivered payload: its original size and the size actually stored.
    pub fn record_payload_bytes(&self, original: u64, stored: u64) {
        self.payload_bytes_total
            .with_label_values(&["original"])
            .inc_by(original);
        self.payload_bytes_total
            .with_label_values(&["stored"])
            .inc_by(stored);
    }

    pub fn record_conflict_detected(&self, conflict_type: &str) {
        self.conflicts_total
            .with_label_values(&["detected", conflict_type])
            .inc();
    }

    pub fn record_conflict_resolved(&self, strategy: &str) {
        self.conflicts_total
            .with_label_values(&["resolved", strategy])
            .inc();
    }

    /// Observe a cycle duration.
    pub fn observe_cycle_duration(&self, result: &str, duration_secs: f64) {
        self.cycle_duration_seconds
            .with_label_values(&[result])
            .observe(duration_secs);
    }

    /// Set the gauges for queue, quarantine and unresolved-conflict counts.
    pub fn set_queue_items(&self, queued: usize, quarantined: usize, conflicts: usize) {
        self.queue_items
            .with_label_values(&["queued"])
            .set(queued as i64);
        self.queue_items
            .with_label_values(&["quarantined"])
            .set(quarantined as i64);
        self.queue_items
            .with_label_values(&["conflicts"])
            .set(conflicts as i64);
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
