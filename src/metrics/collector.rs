//! Counter bank + latency ring, exported as text and JSON.

use super::percentile::{LatencyRing, Percentiles};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct Collector {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cache_writes: AtomicU64,
    pub cache_evictions: AtomicU64,
    pub storage_size_bytes: AtomicU64,
    pub storage_item_count: AtomicU64,

    strategy_attempts: Mutex<HashMap<String, StrategyCounters>>,

    pub request_total: AtomicU64,
    pub error_total: AtomicU64,
    latency: LatencyRing,
}

#[derive(Debug, Clone, Copy, Default)]
struct StrategyCounters {
    attempts: u64,
    successes: u64,
    failures: u64,
    total_latency_ms: u64,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_cache_write(&self, bytes: u64) {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
        self.storage_size_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.storage_item_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_cache_eviction(&self, bytes: u64) {
        self.cache_evictions.fetch_add(1, Ordering::Relaxed);
        self.storage_size_bytes.fetch_sub(bytes.min(self.storage_size_bytes.load(Ordering::Relaxed)), Ordering::Relaxed);
        self.storage_item_count.fetch_sub(1.min(self.storage_item_count.load(Ordering::Relaxed)), Ordering::Relaxed);
    }

    pub fn record_strategy_attempt(&self, name: &str, succeeded: bool, latency_ms: u64) {
        let mut guard = match self.strategy_attempts.lock() {
            Ok(g) => g,
            Err(_) => return,
        };
        let entry = guard.entry(name.to_string()).or_default();
        entry.attempts += 1;
        entry.total_latency_ms += latency_ms;
        if succeeded {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
    }

    pub fn record_request(&self, is_error: bool, latency_ms: u64) {
        self.request_total.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.error_total.fetch_add(1, Ordering::Relaxed);
        }
        self.latency.record(latency_ms);
    }

    pub fn percentiles(&self) -> Percentiles {
        self.latency.percentiles()
    }

    pub fn snapshot(&self) -> CollectorSnapshot {
        let strategies = self
            .strategy_attempts
            .lock()
            .map(|g| {
                g.iter()
                    .map(|(name, c)| {
                        let avg = if c.attempts > 0 { c.total_latency_ms / c.attempts } else { 0 };
                        (
                            name.clone(),
                            StrategySnapshot {
                                attempts: c.attempts,
                                successes: c.successes,
                                failures: c.failures,
                                avg_latency_ms: avg,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        CollectorSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_writes: self.cache_writes.load(Ordering::Relaxed),
            cache_evictions: self.cache_evictions.load(Ordering::Relaxed),
            storage_size_bytes: self.storage_size_bytes.load(Ordering::Relaxed),
            storage_item_count: self.storage_item_count.load(Ordering::Relaxed),
            request_total: self.request_total.load(Ordering::Relaxed),
            error_total: self.error_total.load(Ordering::Relaxed),
            latency: self.percentiles(),
            strategies,
        }
    }

    pub fn render_text(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();
        out.push_str(&format!("cache_hits {}\n", s.cache_hits));
        out.push_str(&format!("cache_misses {}\n", s.cache_misses));
        out.push_str(&format!("cache_writes {}\n", s.cache_writes));
        out.push_str(&format!("cache_evictions {}\n", s.cache_evictions));
        out.push_str(&format!("storage_size_bytes {}\n", s.storage_size_bytes));
        out.push_str(&format!("storage_item_count {}\n", s.storage_item_count));
        out.push_str(&format!("request_total {}\n", s.request_total));
        out.push_str(&format!("error_total {}\n", s.error_total));
        out.push_str(&format!("latency_p50_ms {}\n", s.latency.p50));
        out.push_str(&format!("latency_p95_ms {}\n", s.latency.p95));
        out.push_str(&format!("latency_p99_ms {}\n", s.latency.p99));
        for (name, c) in &s.strategies {
            out.push_str(&format!(
                "strategy{{name=\"{name}\"}} attempts={} successes={} failures={} avg_latency_ms={}\n",
                c.attempts, c.successes, c.failures, c.avg_latency_ms
            ));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategySnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_latency_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectorSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_writes: u64,
    pub cache_evictions: u64,
    pub storage_size_bytes: u64,
    pub storage_item_count: u64,
    pub request_total: u64,
    pub error_total: u64,
    pub latency: Percentiles,
    pub strategies: HashMap<String, StrategySnapshot>,
}
