//! Per-fingerprint in-flight build deduplication.
//!
//! The first caller for a fingerprint creates a per-key lock and holds it
//! while it fetches/cleans/extracts/writes; every other caller for the same
//! key blocks on that same lock. When it releases, the waiter re-checks the
//! cache (which the first caller just populated) instead of repeating the
//! work: first arrival creates an in-flight handle, subsequent arrivals
//! await it.

use crate::error::PipelineResult;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

#[derive(Default)]
pub struct InFlightRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get (creating if absent) the per-key lock for `key`. Callers must hold
    /// the returned lock for the duration of their build attempt.
    pub async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut guard = self.locks.lock().await;
        guard
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the registry entry for `key` once no one else holds a reference,
    /// so the map doesn't grow unboundedly across distinct fingerprints.
    pub async fn release(&self, key: &str, handle: Arc<Mutex<()>>) {
        let mut guard = self.locks.lock().await;
        if let Some(existing) = guard.get(key) {
            // Arc::strong_count == 2: one held by the map, one by `handle`
            // (the caller's own reference about to be dropped).
            if Arc::ptr_eq(existing, &handle) && Arc::strong_count(existing) <= 2 {
                guard.remove(key);
            }
        }
    }
}

/// True single-flight: the first caller for a key computes the value and
/// every caller still waiting on that key — concurrent or merely arriving
/// before cleanup — receives a clone of the exact same result, rather than
/// the "lock, then recheck a separately-persisted cache" dance
/// `InFlightRegistry` relies on. Needed where the computed value isn't
/// always persisted anywhere a waiter could recheck (e.g. a `raw` fetch made
/// on behalf of a `returnOnly` scrape, which never touches the resource
/// cache at all).
pub struct SingleFlight<T> {
    cells: Mutex<HashMap<String, Arc<OnceCell<PipelineResult<T>>>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self { cells: Mutex::new(HashMap::new()) }
    }
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` at most once per `key` among overlapping callers. `f` itself
    /// only runs for whoever finds the cell empty; everyone else awaits that
    /// same cell and clones its result once it resolves.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> PipelineResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let cell = {
            let mut guard = self.cells.lock().await;
            guard
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell.get_or_init(f).await.clone();

        let mut guard = self.cells.lock().await;
        if let Some(existing) = guard.get(key) {
            if Arc::ptr_eq(existing, &cell) && Arc::strong_count(existing) <= 2 {
                guard.remove(key);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_callers_serialize_on_same_key() {
        let registry = Arc::new(InFlightRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let registry = registry.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let lock = registry.lock_for("fp-a").await;
                let _guard = lock.lock().await;
                let before = counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(before, 0, "another task entered the critical section concurrently");
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                counter.fetch_sub(1, Ordering::SeqCst);
                registry.release("fp-a", lock).await;
            }));
        }

        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn single_flight_runs_the_closure_once_for_overlapping_callers() {
        let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let flight = flight.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run("key", || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok(7u32)
                        }
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_flight_runs_again_for_a_later_non_overlapping_call() {
        let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let run_once = |flight: Arc<SingleFlight<u32>>, calls: Arc<AtomicUsize>| async move {
            flight
                .run("key", || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(1u32)
                    }
                })
                .await
        };

        run_once(flight.clone(), calls.clone()).await.unwrap();
        run_once(flight.clone(), calls.clone()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2, "cell is cleaned up between non-overlapping calls");
    }

    #[tokio::test]
    async fn single_flight_propagates_the_error_to_every_waiter() {
        let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
        let result = flight
            .run("key", || async { Err(crate::error::PipelineError::Network("boom".to_string())) })
            .await;
        assert!(result.is_err());
    }
}
