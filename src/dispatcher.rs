use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use webmill_core::counters::FetcherCounter;
use webmill_core::datum::FetchStatus;
use webmill_fetcher::Fetcher;
use webmill_scheduler::{FetchBatch, QueueManager};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Drives domain queues against a fetcher with a pool of worker threads.
///
/// Each worker repeatedly polls the queue registry; when a batch comes
/// back it fetches every URL, appends the completion records to the
/// batch's sink, and releases the batch. When no queue is ready the worker
/// backs off for the poll interval; the queues themselves never wait, so
/// re-polling is entirely the dispatcher's job.
pub struct FetcherDispatcher {
    manager: Arc<QueueManager>,
    fetcher: Arc<dyn Fetcher>,
    poll_interval: Duration,
}

impl FetcherDispatcher {
    /// Create a dispatcher over a queue registry and a fetcher
    pub fn new(manager: Arc<QueueManager>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            manager,
            fetcher,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Change how long idle workers back off between polls
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run `fetcher.max_threads()` workers until every queue is drained
    /// and every batch released.
    ///
    /// Offers may keep arriving while this runs. A worker treats an idle
    /// registry as tentative: it shuts down only after a further poll
    /// comes back empty, so an offer racing the idle check is still
    /// served.
    pub fn run_until_idle(&self) {
        let num_workers = self.fetcher.max_threads().max(1);
        debug!("starting {} fetch workers", num_workers);

        thread::scope(|scope| {
            for worker in 0..num_workers {
                scope.spawn(move || self.worker_loop(worker));
            }
        });
    }

    fn worker_loop(&self, worker: u32) {
        loop {
            if let Some(batch) = self.manager.poll() {
                self.process_batch(batch);
                continue;
            }
            if !self.manager.is_empty() {
                thread::sleep(self.poll_interval);
                continue;
            }
            // An offer can land between the empty poll and the idle
            // check; only a poll that still comes back empty afterwards
            // confirms shutdown.
            match self.manager.poll() {
                Some(batch) => self.process_batch(batch),
                None => break,
            }
        }
        debug!("fetch worker {} idle, exiting", worker);
    }

    fn process_batch(&self, batch: FetchBatch) {
        let counters = self.manager.counters();
        for item in batch.iter() {
            let datum = self.fetcher.fetch(item);
            let outcome = if datum.status == FetchStatus::Fetched {
                FetcherCounter::UrlsFetched
            } else {
                FetcherCounter::UrlsFailed
            };
            counters.increment(outcome, 1);

            if let Err(error) = batch.sink().append(datum) {
                warn!(
                    "failed to record fetch result for {}: {}",
                    item.url(),
                    error
                );
            }
        }
        self.manager.release(batch);
    }
}
