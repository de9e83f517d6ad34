//! Internal metrics collection.
//!
//! Collects metrics in-memory; the scheduler logs a snapshot periodically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the stats engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Tracking metrics
    pub downloads_tracked: Counter,
    pub downloads_deduplicated: Counter,
    pub version_checks_tracked: Counter,
    pub version_checks_deduplicated: Counter,
    pub tracking_errors: Counter,
    pub version_updates_recorded: Counter,

    // Dimension resolver metrics
    pub dimension_cache_hits: Counter,
    pub dimension_cache_misses: Counter,
    pub dimensions_created: Counter,

    // Rollup metrics
    pub rollup_runs: Counter,
    pub rollup_failures: Counter,

    // Compaction metrics
    pub compaction_groups_written: Counter,
    pub compaction_rows_deleted: Counter,
    pub compaction_failures: Counter,

    // Latency histograms
    pub track_latency_ms: Histogram,
    pub rollup_latency_ms: Histogram,
    pub compaction_latency_ms: Histogram,

    // Gauges
    pub dimension_cache_size: Gauge,
    pub last_rollup_unix: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub downloads_tracked: u64,
    pub downloads_deduplicated: u64,
    pub version_checks_tracked: u64,
    pub version_checks_deduplicated: u64,
    pub tracking_errors: u64,
    pub version_updates_recorded: u64,
    pub dimension_cache_hits: u64,
    pub dimension_cache_misses: u64,
    pub dimensions_created: u64,
    pub rollup_runs: u64,
    pub rollup_failures: u64,
    pub compaction_groups_written: u64,
    pub compaction_rows_deleted: u64,
    pub compaction_failures: u64,
    pub track_latency_mean_ms: f64,
    pub rollup_latency_mean_ms: f64,
    pub compaction_latency_mean_ms: f64,
    pub dimension_cache_size: u64,
    pub last_rollup_unix: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            downloads_tracked: self.downloads_tracked.get(),
            downloads_deduplicated: self.downloads_deduplicated.get(),
            version_checks_tracked: self.version_checks_tracked.get(),
            version_checks_deduplicated: self.version_checks_deduplicated.get(),
            tracking_errors: self.tracking_errors.get(),
            version_updates_recorded: self.version_updates_recorded.get(),
            dimension_cache_hits: self.dimension_cache_hits.get(),
            dimension_cache_misses: self.dimension_cache_misses.get(),
            dimensions_created: self.dimensions_created.get(),
            rollup_runs: self.rollup_runs.get(),
            rollup_failures: self.rollup_failures.get(),
            compaction_groups_written: self.compaction_groups_written.get(),
            compaction_rows_deleted: self.compaction_rows_deleted.get(),
            compaction_failures: self.compaction_failures.get(),
            track_latency_mean_ms: self.track_latency_ms.mean(),
            rollup_latency_mean_ms: self.rollup_latency_ms.mean(),
            compaction_latency_mean_ms: self.compaction_latency_ms.mean(),
            dimension_cache_size: self.dimension_cache_size.get(),
            last_rollup_unix: self.last_rollup_unix.get(),
        }
    }
}

/// Log a snapshot as one structured line.
pub fn log_metrics(snapshot: &MetricsSnapshot) {
    tracing::info!(
        downloads_tracked = snapshot.downloads_tracked,
        downloads_deduplicated = snapshot.downloads_deduplicated,
        version_checks_tracked = snapshot.version_checks_tracked,
        version_checks_deduplicated = snapshot.version_checks_deduplicated,
        tracking_errors = snapshot.tracking_errors,
        cache_hits = snapshot.dimension_cache_hits,
        cache_misses = snapshot.dimension_cache_misses,
        cache_size = snapshot.dimension_cache_size,
        rollup_runs = snapshot.rollup_runs,
        rollup_failures = snapshot.rollup_failures,
        compaction_rows_deleted = snapshot.compaction_rows_deleted,
        compaction_failures = snapshot.compaction_failures,
        track_latency_mean_ms = snapshot.track_latency_mean_ms,
        rollup_latency_mean_ms = snapshot.rollup_latency_mean_ms,
        "Metrics snapshot"
    );
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
