//! In-process pipeline metrics.
//!
//! Collected in memory and periodically logged by the worker scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
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
}

/// A gauge that never drops below zero.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    /// Raises the gauge until the returned guard is dropped.
    pub fn track(&self) -> GaugeGuard<'_> {
        self.inc();
        GaugeGuard {
            gauge: self,
            armed: true,
        }
    }
}

/// Lowers its gauge on drop, unless kept with [`GaugeGuard::keep`].
#[derive(Debug)]
pub struct GaugeGuard<'a> {
    gauge: &'a Gauge,
    armed: bool,
}

impl GaugeGuard<'_> {
    /// Leaves the gauge raised; someone else lowers it later.
    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gauge.dec();
        }
    }
}

/// Latency histogram with fixed millisecond buckets.
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; 12],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    /// Upper bounds in ms. Model calls routinely land in the top buckets.
    const BUCKET_BOUNDS: [u64; 12] = [
        1, 5, 10, 25, 50, 100, 250, 500, 1_000, 5_000, 30_000, 120_000,
    ];

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

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            count => self.sum() as f64 / count as f64,
        }
    }

    /// Returns (upper bound, count) pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the insight sink.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion
    pub envelopes_received: Counter,
    pub envelopes_rejected: Counter,
    pub measurements_inserted: Counter,
    pub storage_errors: Counter,

    // Insight generation
    pub insights_triggered: Counter,
    pub insights_generated: Counter,
    pub generation_errors: Counter,

    // Handoff
    pub handoff_processed: Counter,

    // Latency histograms
    pub ingest_latency_ms: Histogram,
    pub store_latency_ms: Histogram,
    pub model_latency_ms: Histogram,

    // Gauges
    pub handoff_queue_depth: Gauge,
    /// Producers waiting on a full handoff queue
    pub blocked_producers: Gauge,
    pub outstanding_insight_tasks: Gauge,
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
    pub envelopes_received: u64,
    pub envelopes_rejected: u64,
    pub measurements_inserted: u64,
    pub storage_errors: u64,
    pub insights_triggered: u64,
    pub insights_generated: u64,
    pub generation_errors: u64,
    pub handoff_processed: u64,
    pub ingest_latency_mean_ms: f64,
    pub store_latency_mean_ms: f64,
    pub model_latency_mean_ms: f64,
    pub handoff_queue_depth: u64,
    pub blocked_producers: u64,
    pub outstanding_insight_tasks: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            envelopes_received: self.envelopes_received.get(),
            envelopes_rejected: self.envelopes_rejected.get(),
            measurements_inserted: self.measurements_inserted.get(),
            storage_errors: self.storage_errors.get(),
            insights_triggered: self.insights_triggered.get(),
            insights_generated: self.insights_generated.get(),
            generation_errors: self.generation_errors.get(),
            handoff_processed: self.handoff_processed.get(),
            ingest_latency_mean_ms: self.ingest_latency_ms.mean(),
            store_latency_mean_ms: self.store_latency_ms.mean(),
            model_latency_mean_ms: self.model_latency_ms.mean(),
            handoff_queue_depth: self.handoff_queue_depth.get(),
            blocked_producers: self.blocked_producers.get(),
            outstanding_insight_tasks: self.outstanding_insight_tasks.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
