//! Lookup counters, enabled by the `metrics` feature.
//!
//! Recording is relaxed atomic increments on paths that already aggregate
//! their counts, so the hot scan loops stay branch-free. Snapshots are not
//! mutually consistent across counters; they are monitoring data, not an
//! accounting ledger.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters owned by one dictionary instance.
#[derive(Debug, Default)]
pub struct LookupMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    source_requests: AtomicU64,
    requested_keys: AtomicU64,
    update_rows: AtomicU64,
}

impl LookupMetrics {
    /// Records the outcome of one scan pass.
    pub fn record_scan(&self, hits: u64, misses: u64) {
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(misses, Ordering::Relaxed);
    }

    /// Records one coalesced source fetch of `keys` distinct keys.
    pub fn record_source_request(&self, keys: u64) {
        self.source_requests.fetch_add(1, Ordering::Relaxed);
        self.requested_keys.fetch_add(keys, Ordering::Relaxed);
    }

    /// Records `rows` rows written back from a source block.
    pub fn record_update_rows(&self, rows: u64) {
        self.update_rows.fetch_add(rows, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            source_requests: self.source_requests.load(Ordering::Relaxed),
            requested_keys: self.requested_keys.load(Ordering::Relaxed),
            update_rows: self.update_rows.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Positions answered from the table (non-zero keys only).
    pub hits: u64,
    /// Positions classified as miss or expired.
    pub misses: u64,
    /// Coalesced source fetches issued.
    pub source_requests: u64,
    /// Distinct keys requested across all fetches.
    pub requested_keys: u64,
    /// Rows the source returned and the cache wrote back.
    pub update_rows: u64,
}

impl MetricsSnapshot {
    /// Hit fraction over all classified positions, 0.0 when idle.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
