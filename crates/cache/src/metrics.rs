//! Cache hit/miss accounting.
//!
//! Counters are process-wide atomics; the snapshot endpoint reads them
//! without locking.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    total_latency_micros: AtomicU64,
    lookups: AtomicU64,
}

/// A point-in-time view of the cache counters, serialized with the field
/// names the metrics endpoint exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub total: u64,
    pub hit_rate: f64,
    #[serde(rename = "avgLatency")]
    pub avg_latency_ms: f64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, micros: u64) {
        self.total_latency_micros.fetch_add(micros, Ordering::Relaxed);
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let lookups = self.lookups.load(Ordering::Relaxed);
        let total_latency = self.total_latency_micros.load(Ordering::Relaxed);

        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        let avg_latency_ms = if lookups > 0 {
            total_latency as f64 / lookups as f64 / 1000.0
        } else {
            0.0
        };

        MetricsSnapshot {
            hits,
            misses,
            errors,
            total,
            hit_rate,
            avg_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_math() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_error();
        metrics.record_latency(2_000);
        metrics.record_latency(4_000);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hits, 3);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.total, 4);
        assert!((snapshot.hit_rate - 0.75).abs() < f64::EPSILON);
        assert!((snapshot.avg_latency_ms - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_snapshot_has_no_nan() {
        let snapshot = CacheMetrics::new().snapshot();
        assert_eq!(snapshot.hit_rate, 0.0);
        assert_eq!(snapshot.avg_latency_ms, 0.0);
    }
}
