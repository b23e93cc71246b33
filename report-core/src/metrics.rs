//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring imports and report
//! assembly.
//!
//! # Metrics
//!
//! - `reports_rows_imported_total` - Total report rows inserted
//! - `reports_empty_buckets_total` - Month buckets that returned no data
//! - `reports_fetch_duration_seconds` - Histogram of source API fetch latencies
//! - `reports_callback_failures_total` - Completion callbacks that failed
//! - `reports_assembled_total` - Enriched reports assembled

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total report rows inserted
    pub rows_imported: IntCounter,

    /// Month buckets that returned no data
    pub empty_buckets: IntCounter,

    /// Source API fetch latency histogram
    pub fetch_duration: Histogram,

    /// Completion callbacks that failed
    pub callback_failures: IntCounter,

    /// Enriched reports assembled
    pub reports_assembled: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let rows_imported = IntCounter::with_opts(Opts::new(
            "reports_rows_imported_total",
            "Total report rows inserted",
        ))?;
        registry.register(Box::new(rows_imported.clone()))?;

        let empty_buckets = IntCounter::with_opts(Opts::new(
            "reports_empty_buckets_total",
            "Month buckets that returned no data",
        ))?;
        registry.register(Box::new(empty_buckets.clone()))?;

        let fetch_duration = Histogram::with_opts(
            HistogramOpts::new(
                "reports_fetch_duration_seconds",
                "Histogram of source API fetch latencies",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        registry.register(Box::new(fetch_duration.clone()))?;

        let callback_failures = IntCounter::with_opts(Opts::new(
            "reports_callback_failures_total",
            "Completion callbacks that failed",
        ))?;
        registry.register(Box::new(callback_failures.clone()))?;

        let reports_assembled = IntCounter::with_opts(Opts::new(
            "reports_assembled_total",
            "Enriched reports assembled",
        ))?;
        registry.register(Box::new(reports_assembled.clone()))?;

        Ok(Self {
            rows_imported,
            empty_buckets,
            fetch_duration,
            callback_failures,
            reports_assembled,
            registry,
        })
    }

    /// Record inserted rows
    pub fn record_rows_imported(&self, count: usize) {
        self.rows_imported.inc_by(count as u64);
    }

    /// Record an empty month bucket
    pub fn record_empty_bucket(&self) {
        self.empty_buckets.inc();
    }

    /// Record a source API fetch duration
    pub fn record_fetch_duration(&self, duration_seconds: f64) {
        self.fetch_duration.observe(duration_seconds);
    }

    /// Record a failed completion callback
    pub fn record_callback_failure(&self) {
        self.callback_failures.inc();
    }

    /// Record an assembled report
    pub fn record_report_assembled(&self) {
        self.reports_assembled.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
