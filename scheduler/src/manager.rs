use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

use webmill_core::clock::Clock;
use webmill_core::counters::{Counters, FetcherCounter};
use webmill_core::datum::ScoredUrl;
use webmill_core::sink::OutputSink;

use crate::batch::FetchBatch;
use crate::policy::FetcherPolicy;
use crate::queue::DomainQueue;

/// Registry of domain queues for one crawl.
///
/// Routes offered URLs to the queue of their host (creating queues on
/// first sight), scans queues on behalf of fetcher dispatchers, and tears
/// queues down once they are drained. All queues share one policy, clock,
/// sink and counter set.
pub struct QueueManager {
    policy: Arc<FetcherPolicy>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn OutputSink>,
    counters: Arc<dyn Counters>,
    queues: DashMap<String, Arc<DomainQueue>>,
}

impl QueueManager {
    /// Create an empty registry
    pub fn new(
        policy: Arc<FetcherPolicy>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn OutputSink>,
        counters: Arc<dyn Counters>,
    ) -> Self {
        Self {
            policy,
            clock,
            sink,
            counters,
            queues: DashMap::new(),
        }
    }

    /// The shared counter registry
    pub fn counters(&self) -> Arc<dyn Counters> {
        Arc::clone(&self.counters)
    }

    /// Route a URL to its host's queue; returns whether it was retained.
    ///
    /// URLs without a host cannot be partitioned and are rejected. Every
    /// rejection, here or by a full queue, bumps `UrlsRejected`.
    pub fn offer(&self, item: ScoredUrl) -> bool {
        let Some(host) = item.host() else {
            debug!("discarding url without a host: {}", item.url());
            self.counters.increment(FetcherCounter::UrlsRejected, 1);
            return false;
        };

        let queue = match self.queues.get(&host) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                let queue = Arc::new(DomainQueue::new(
                    host.clone(),
                    Arc::clone(&self.policy),
                    Arc::clone(&self.clock),
                    Arc::clone(&self.sink),
                    Arc::clone(&self.counters),
                ));
                // Entry resolves the race with a concurrent producer
                // creating the same queue.
                Arc::clone(self.queues.entry(host).or_insert(queue).value())
            }
        };

        let accepted = queue.offer(item);
        if !accepted {
            self.counters.increment(FetcherCounter::UrlsRejected, 1);
        }
        accepted
    }

    /// Return a batch from the first queue willing to release one now
    pub fn poll(&self) -> Option<FetchBatch> {
        for entry in self.queues.iter() {
            if let Some(batch) = entry.value().poll() {
                return Some(batch);
            }
        }
        None
    }

    /// Release a batch back to the queue it came from
    pub fn release(&self, batch: FetchBatch) {
        let queue = self
            .queues
            .get(batch.domain())
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_else(|| panic!("batch released for unknown domain {}", batch.domain()));
        queue.release(batch);
    }

    /// Whether every queue is drained and every batch released
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|entry| entry.value().is_empty())
    }

    /// Total URLs retained across all queues
    pub fn len(&self) -> usize {
        self.queues.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of live queues
    pub fn num_queues(&self) -> usize {
        self.queues.len()
    }

    /// The queue for a host, if one exists
    pub fn queue(&self, domain: &str) -> Option<Arc<DomainQueue>> {
        self.queues
            .get(domain)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Drain every queue into the sink as aborted records
    pub fn abort_all(&self) {
        for entry in self.queues.iter() {
            entry.value().abort_all();
        }
    }

    /// Drop queues that are drained and fully released; returns how many
    /// were removed.
    ///
    /// A queue with a batch outstanding is never `is_empty()`, so pruning
    /// cannot orphan a release.
    pub fn prune(&self) -> usize {
        let before = self.queues.len();
        self.queues.retain(|_, queue| !queue.is_empty());
        before - self.queues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmill_core::clock::ManualClock;
    use webmill_core::counters::AtomicCounters;
    use webmill_core::sink::MemorySink;

    fn manager(policy: FetcherPolicy) -> QueueManager {
        QueueManager::new(
            Arc::new(policy),
            Arc::new(ManualClock::new(0)),
            Arc::new(MemorySink::new()),
            Arc::new(AtomicCounters::new()),
        )
    }

    fn scored(url: &str, score: f64) -> ScoredUrl {
        ScoredUrl::new(url, score).unwrap()
    }

    #[test]
    fn test_offer_routes_by_host() {
        let manager = manager(FetcherPolicy::default());

        assert!(manager.offer(scored("https://example.com/1", 1.0)));
        assert!(manager.offer(scored("https://example.com/2", 2.0)));
        assert!(manager.offer(scored("https://example.org/1", 3.0)));

        assert_eq!(manager.num_queues(), 2);
        assert_eq!(manager.len(), 3);
        assert_eq!(manager.queue("example.com").unwrap().len(), 2);
        assert_eq!(manager.queue("example.org").unwrap().len(), 1);
    }

    #[test]
    fn test_offer_rejects_hostless_url() {
        let manager = manager(FetcherPolicy::default());

        assert!(!manager.offer(scored("data:text/plain,hello", 1.0)));
        assert_eq!(manager.num_queues(), 0);
        assert_eq!(
            manager.counters().get(FetcherCounter::UrlsRejected),
            1
        );
    }

    #[test]
    fn test_rejections_are_counted() {
        let policy = FetcherPolicy::builder().max_urls(1).build().unwrap();
        let manager = manager(policy);

        assert!(manager.offer(scored("https://example.com/best", 9.0)));
        assert!(!manager.offer(scored("https://example.com/worse", 1.0)));
        assert_eq!(
            manager.counters().get(FetcherCounter::UrlsRejected),
            1
        );
    }

    #[test]
    fn test_poll_release_and_prune() {
        let policy = FetcherPolicy::builder().crawl_delay_ms(0).build().unwrap();
        let manager = manager(policy);

        manager.offer(scored("https://example.com/1", 1.0));
        assert!(!manager.is_empty());

        let batch = manager.poll().expect("a batch is due");
        assert_eq!(batch.domain(), "example.com");
        assert!(!manager.is_empty());
        assert_eq!(manager.prune(), 0);

        manager.release(batch);
        assert!(manager.is_empty());
        assert_eq!(manager.prune(), 1);
        assert_eq!(manager.num_queues(), 0);
    }

    #[test]
    fn test_abort_all_drains_every_queue() {
        let manager = manager(FetcherPolicy::default());
        manager.offer(scored("https://example.com/1", 1.0));
        manager.offer(scored("https://example.org/1", 2.0));

        manager.abort_all();
        assert!(manager.is_empty());
        assert_eq!(manager.counters().get(FetcherCounter::UrlsAborted), 2);
    }
}
