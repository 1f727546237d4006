use std::sync::{Arc, Mutex, MutexGuard};

use log::{trace, warn};

use webmill_core::clock::Clock;
use webmill_core::counters::{Counters, FetcherCounter};
use webmill_core::datum::{FetchedDatum, ScoredUrl};
use webmill_core::sink::OutputSink;

use crate::batch::FetchBatch;
use crate::policy::FetcherPolicy;

/// Bounded priority queue of scored URLs for one origin host.
///
/// The queue retains the top-`max_urls` URLs seen so far and releases them
/// in batches under the politeness policy: at most `threads_per_host`
/// batches outstanding, and under the single-threaded polite policy a gap
/// of at least `crawl_delay_ms` between releases. Past the crawl deadline,
/// any poll drains the remaining URLs into the sink as aborted records.
///
/// All operations share one critical section over the queue state, hold it
/// for time proportional to the queue length, and never wait in it: `poll`
/// returns `None` rather than sleeping, and the caller decides when to
/// re-poll.
pub struct DomainQueue {
    domain: String,
    policy: Arc<FetcherPolicy>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn OutputSink>,
    counters: Arc<dyn Counters>,
    state: Mutex<QueueState>,
}

struct QueueState {
    /// Retained URLs; ordered best-first only when `sorted` is set
    items: Vec<ScoredUrl>,
    /// Batches dispatched and not yet released
    num_active_fetchers: u32,
    /// Earliest instant the next single-threaded batch may be released
    next_fetch_time_ms: i64,
    sorted: bool,
}

impl QueueState {
    /// Restore score-descending order; no-op when already sorted
    fn sort(&mut self) {
        if !self.sorted {
            self.sorted = true;
            self.items.sort();
        }
    }
}

impl DomainQueue {
    /// Create an empty queue for one origin host.
    ///
    /// The sink and counters are shared process-wide handles; the policy is
    /// shared read-only across all queues of the crawl.
    pub fn new(
        domain: impl Into<String>,
        policy: Arc<FetcherPolicy>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn OutputSink>,
        counters: Arc<dyn Counters>,
    ) -> Self {
        let domain = domain.into();
        let next_fetch_time_ms = clock.epoch_millis();
        trace!(
            "setting up queue for {} with next fetch time of {}",
            domain,
            next_fetch_time_ms
        );

        Self {
            domain,
            policy,
            clock,
            sink,
            counters,
            state: Mutex::new(QueueState {
                items: Vec::new(),
                num_active_fetchers: 0,
                next_fetch_time_ms,
                sorted: true,
            }),
        }
    }

    /// The origin host this queue serves
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Number of URLs currently retained
    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    /// Whether the queue can be torn down: nothing retained and every
    /// dispatched batch released.
    pub fn is_empty(&self) -> bool {
        let state = self.state();
        state.items.is_empty() && state.num_active_fetchers == 0
    }

    /// Offer a URL for fetching; returns whether it was retained.
    ///
    /// Below the bound this is an O(1) append. At the bound the incoming
    /// URL must beat the lowest-scored entry, which is then evicted and the
    /// newcomer inserted at its sorted position.
    pub fn offer(&self, item: ScoredUrl) -> bool {
        let mut state = self.state();

        if state.items.len() < self.policy.max_urls() as usize {
            state.items.push(item);
            state.sorted = false;
            return true;
        }

        // Full, so eviction needs the list ordered first.
        state.sort();

        let worst = state
            .items
            .last()
            .expect("a full queue holds at least one item");
        if item.score() <= worst.score() {
            trace!("queue for {} full, rejecting {}", self.domain, item.url());
            return false;
        }

        state.items.pop();
        let index = state.items.binary_search(&item).unwrap_or_else(|slot| slot);
        state.items.insert(index, item);
        true
    }

    /// Release a batch of URLs that may be fetched now, if the policy
    /// allows one.
    ///
    /// The clock is sampled once per call. Past the crawl deadline the
    /// remaining URLs are drained as aborted (inline, under the same lock)
    /// and `None` is returned; with multiple threads per host each free
    /// fetcher slot gets a one-URL batch immediately; under the
    /// single-threaded polite policy a batch goes out only when the
    /// previous one has been released and the crawl delay has elapsed.
    pub fn poll(&self) -> Option<FetchBatch> {
        let now_ms = self.clock.epoch_millis();
        let mut state = self.state();

        if state.items.is_empty() {
            return None;
        }

        if let Some(end_ms) = self.policy.crawl_end_ms() {
            if now_ms >= end_ms {
                // Past the end of the target fetch window, so bail.
                self.drain_aborted(&mut state);
                return None;
            }
        }

        if self.policy.threads_per_host() > 1 {
            if state.num_active_fetchers < self.policy.threads_per_host() {
                state.num_active_fetchers += 1;
                state.sort();
                let item = state.items.remove(0);
                self.counters.increment(FetcherCounter::DomainsFetching, 1);
                return Some(self.batch(vec![item]));
            }
            return None;
        }

        if state.num_active_fetchers == 0 && now_ms >= state.next_fetch_time_ms {
            state.sort();
            let request = self.policy.fetch_request(now_ms, state.items.len());
            // The plan never asks for more than the queue holds, but a
            // short batch beats a panic here.
            let take = request.num_urls.min(state.items.len());
            let items: Vec<ScoredUrl> = state.items.drain(..take).collect();

            state.num_active_fetchers += 1;
            state.next_fetch_time_ms = request.next_request_ms;
            self.counters.increment(FetcherCounter::DomainsFetching, 1);
            trace!(
                "releasing {} urls for {} with next fetch time of {}",
                items.len(),
                self.domain,
                state.next_fetch_time_ms
            );
            return Some(self.batch(items));
        }

        None
    }

    /// Signal that a batch previously returned by [`poll`](Self::poll) has
    /// been fully processed.
    ///
    /// Consuming the batch makes a double release unrepresentable; a batch
    /// from another queue or a release with nothing outstanding is a fatal
    /// programming error.
    pub fn release(&self, batch: FetchBatch) {
        assert_eq!(
            batch.domain(),
            self.domain,
            "batch released to a queue it did not come from"
        );

        let mut state = self.state();
        assert!(
            state.num_active_fetchers > 0,
            "release with no batch outstanding for {}",
            self.domain
        );
        state.num_active_fetchers -= 1;
        self.counters.decrement(FetcherCounter::DomainsFetching, 1);
    }

    /// Write every retained URL to the sink as an aborted record and clear
    /// the queue.
    ///
    /// Batches already dispatched are untouched; their fetchers still
    /// release them. Calling this twice is a no-op the second time.
    pub fn abort_all(&self) {
        let mut state = self.state();
        self.drain_aborted(&mut state);
    }

    /// Drain `items` into the sink as aborted records, best-scored first.
    /// Runs under the queue lock; `poll` calls it inline past the deadline
    /// rather than re-acquiring.
    fn drain_aborted(&self, state: &mut MutexGuard<'_, QueueState>) {
        if state.items.is_empty() {
            return;
        }

        state.sort();
        let num_aborted = state.items.len();
        for item in state.items.drain(..) {
            // A sink write can fail transiently; the drain still visits
            // every URL and always leaves the queue empty.
            if let Err(error) = self.sink.append(FetchedDatum::aborted(&item)) {
                warn!(
                    "failed to record aborted url {} for {}: {}",
                    item.url(),
                    self.domain,
                    error
                );
            }
        }
        self.counters
            .increment(FetcherCounter::UrlsAborted, num_aborted as i64);
        trace!("aborted {} urls for {}", num_aborted, self.domain);
    }

    fn batch(&self, items: Vec<ScoredUrl>) -> FetchBatch {
        FetchBatch::new(self.domain.clone(), items, Arc::clone(&self.sink))
    }

    /// The queue survives a panic in no state worth rescuing; a poisoned
    /// lock is the fatal-assertion case of the failure model.
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().expect("domain queue lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmill_core::clock::ManualClock;
    use webmill_core::counters::AtomicCounters;
    use webmill_core::sink::MemorySink;

    fn queue_with(
        policy: FetcherPolicy,
        clock: Arc<ManualClock>,
        sink: Arc<MemorySink>,
    ) -> DomainQueue {
        DomainQueue::new(
            "example.com",
            Arc::new(policy),
            clock as Arc<dyn Clock>,
            sink as Arc<dyn OutputSink>,
            Arc::new(AtomicCounters::new()) as Arc<dyn Counters>,
        )
    }

    fn scored(url: &str, score: f64) -> ScoredUrl {
        ScoredUrl::new(url, score).unwrap()
    }

    #[test]
    fn test_offer_below_bound() {
        let clock = Arc::new(ManualClock::new(0));
        let queue = queue_with(FetcherPolicy::default(), clock, Arc::new(MemorySink::new()));

        assert!(queue.offer(scored("https://example.com/a", 1.0)));
        assert!(queue.offer(scored("https://example.com/b", 2.0)));
        assert_eq!(queue.len(), 2);
        assert!(!queue.is_empty());
    }

    #[test]
    fn test_offer_at_bound_evicts_worst() {
        let clock = Arc::new(ManualClock::new(0));
        let policy = FetcherPolicy::builder().max_urls(2).build().unwrap();
        let queue = queue_with(policy, clock, Arc::new(MemorySink::new()));

        assert!(queue.offer(scored("https://example.com/1", 5.0)));
        assert!(queue.offer(scored("https://example.com/2", 1.0)));
        assert!(queue.offer(scored("https://example.com/3", 3.0)));
        assert!(!queue.offer(scored("https://example.com/4", 0.0)));
        assert!(queue.offer(scored("https://example.com/5", 9.0)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_poll_empty_queue() {
        let clock = Arc::new(ManualClock::new(0));
        let queue = queue_with(FetcherPolicy::default(), clock, Arc::new(MemorySink::new()));
        assert!(queue.poll().is_none());
    }

    #[test]
    #[should_panic(expected = "no batch outstanding")]
    fn test_release_without_poll_panics() {
        let clock = Arc::new(ManualClock::new(0));
        let sink = Arc::new(MemorySink::new());
        let policy = FetcherPolicy::builder().crawl_delay_ms(0).build().unwrap();
        let queue = queue_with(policy.clone(), Arc::clone(&clock), Arc::clone(&sink));
        let other = queue_with(policy, clock, sink);

        queue.offer(scored("https://example.com/a", 1.0));
        let batch = queue.poll().unwrap();
        // Same domain name, so the domain assertion passes and the counter
        // assertion must catch it.
        other.release(batch);
    }

    #[test]
    #[should_panic(expected = "did not come from")]
    fn test_release_foreign_domain_panics() {
        let clock = Arc::new(ManualClock::new(0));
        let sink = Arc::new(MemorySink::new());
        let policy = Arc::new(FetcherPolicy::builder().crawl_delay_ms(0).build().unwrap());
        let counters = Arc::new(AtomicCounters::new());

        let queue = DomainQueue::new(
            "example.com",
            Arc::clone(&policy),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&sink) as Arc<dyn OutputSink>,
            Arc::clone(&counters) as Arc<dyn Counters>,
        );
        let other = DomainQueue::new(
            "example.org",
            policy,
            clock as Arc<dyn Clock>,
            sink as Arc<dyn OutputSink>,
            counters as Arc<dyn Counters>,
        );

        queue.offer(scored("https://example.com/a", 1.0));
        let batch = queue.poll().unwrap();
        other.release(batch);
    }
}
