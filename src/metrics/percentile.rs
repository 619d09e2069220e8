//! Fixed-size latency histogram for best-effort p50/p95/p99 reporting.
//!
//! Lock-free append via an atomic write cursor into a ring buffer; readers
//! take a best-effort snapshot (no synchronization with concurrent writers
//! beyond the cursor itself) which is acceptable for monitoring output.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const RING_SIZE: usize = 4096;

pub struct LatencyRing {
    samples: Vec<AtomicU64>,
    cursor: AtomicUsize,
    count: AtomicUsize,
}

impl Default for LatencyRing {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyRing {
    pub fn new() -> Self {
        Self {
            samples: (0..RING_SIZE).map(|_| AtomicU64::new(0)).collect(),
            cursor: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
        }
    }

    pub fn record(&self, millis: u64) {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % RING_SIZE;
        self.samples[idx].store(millis, Ordering::Relaxed);
        let current = self.count.load(Ordering::Relaxed);
        if current < RING_SIZE {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn percentiles(&self) -> Percentiles {
        let n = self.count.load(Ordering::Relaxed).min(RING_SIZE);
        if n == 0 {
            return Percentiles::default();
        }
        let mut values: Vec<u64> = self.samples[..n].iter().map(|a| a.load(Ordering::Relaxed)).collect();
        values.sort_unstable();
        Percentiles {
            p50: percentile_of(&values, 0.50),
            p95: percentile_of(&values, 0.95),
            p99: percentile_of(&values, 0.99),
        }
    }
}

fn percentile_of(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct Percentiles {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_reports_zero_percentiles() {
        let ring = LatencyRing::new();
        let p = ring.percentiles();
        assert_eq!(p.p50, 0);
        assert_eq!(p.p95, 0);
        assert_eq!(p.p99, 0);
    }

    #[test]
    fn percentiles_reflect_recorded_samples() {
        let ring = LatencyRing::new();
        for ms in 1..=100u64 {
            ring.record(ms);
        }
        let p = ring.percentiles();
        assert_eq!(p.p50, 51);
        assert_eq!(p.p95, 95);
        assert_eq!(p.p99, 99);
    }

    #[test]
    fn ring_wraps_and_keeps_only_the_most_recent_samples() {
        let ring = LatencyRing::new();
        for ms in 0..(RING_SIZE as u64 + 10) {
            ring.record(ms);
        }
        let p = ring.percentiles();
        // The oldest 10 samples (0..10) should have been overwritten.
        assert!(p.p50 >= 10);
    }
}
