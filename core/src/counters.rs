use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

/// Names of the process-wide observability counters maintained by the
/// scheduler and the dispatch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetcherCounter {
    /// Gauge: queues with a dispatched batch outstanding
    DomainsFetching,
    /// URLs turned away by a full queue
    UrlsRejected,
    /// URLs drained as aborted when the crawl window closed
    UrlsAborted,
    /// URLs fetched successfully
    UrlsFetched,
    /// URLs whose fetch attempt failed
    UrlsFailed,
}

/// Process-wide counter registry.
///
/// Injected at queue construction rather than reached for as a global, so
/// tests can observe counter traffic in isolation.
pub trait Counters: Send + Sync {
    /// Add `delta` to a counter
    fn increment(&self, counter: FetcherCounter, delta: i64);

    /// Subtract `delta` from a counter
    fn decrement(&self, counter: FetcherCounter, delta: i64) {
        self.increment(counter, -delta);
    }

    /// Current value of a counter
    fn get(&self, counter: FetcherCounter) -> i64;
}

/// Counter registry backed by per-name atomics.
#[derive(Debug, Default)]
pub struct AtomicCounters {
    values: DashMap<FetcherCounter, AtomicI64>,
}

impl AtomicCounters {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counters for AtomicCounters {
    fn increment(&self, counter: FetcherCounter, delta: i64) {
        self.values
            .entry(counter)
            .or_default()
            .fetch_add(delta, Ordering::Relaxed);
    }

    fn get(&self, counter: FetcherCounter) -> i64 {
        self.values
            .get(&counter)
            .map(|value| value.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

/// Counter registry that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCounters;

impl Counters for NullCounters {
    fn increment(&self, _counter: FetcherCounter, _delta: i64) {}

    fn get(&self, _counter: FetcherCounter) -> i64 {
        0
    }
}
