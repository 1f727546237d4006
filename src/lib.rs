//! # Webmill
//!
//! Webmill is the polite fetch scheduling layer of a distributed
//! web-mining toolkit. Upstream scorers offer prioritized URLs; webmill
//! partitions them by origin host into bounded priority queues and
//! releases batches to fetcher workers under a politeness policy: a
//! minimum delay between requests to one host, a cap on concurrent
//! connections per host, optional keep-alive batching, and a global crawl
//! deadline that drains whatever is left as aborted records.
//!
//! ## Components
//!
//! - **Core**: shared value types and seams: scored URLs, completion
//!   records, the output sink, counters, and the clock.
//! - **Scheduler**: the per-domain queues, the politeness policy, and the
//!   queue registry.
//! - **Fetcher**: the transport boundary trait and a simulation fetcher.
//! - **Dispatcher**: a thread pool that drives queues against a fetcher.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webmill::prelude::*;
//!
//! fn main() -> Result<()> {
//!     env_logger::init();
//!
//!     let policy = FetcherPolicy::builder()
//!         .crawl_delay_ms(1_000)
//!         .max_urls(1_000)
//!         .build()?;
//!
//!     let sink = Arc::new(MemorySink::new());
//!     let manager = Arc::new(QueueManager::new(
//!         Arc::new(policy.clone()),
//!         Arc::new(SystemClock),
//!         sink.clone(),
//!         Arc::new(AtomicCounters::new()),
//!     ));
//!
//!     manager.offer(ScoredUrl::new("https://example.com/", 1.0)?);
//!
//!     let fetcher = Arc::new(FakeFetcher::random(4, policy));
//!     FetcherDispatcher::new(manager, fetcher).run_until_idle();
//!
//!     println!("fetched {} urls", sink.len());
//!     Ok(())
//! }
//! ```

pub use webmill_core as core;
pub use webmill_fetcher as fetcher;
pub use webmill_scheduler as scheduler;

pub mod dispatcher;

/// Prelude module that re-exports commonly used types
pub mod prelude {
    pub use webmill_core::clock::{Clock, ManualClock, SystemClock};
    pub use webmill_core::counters::{AtomicCounters, Counters, FetcherCounter, NullCounters};
    pub use webmill_core::datum::{FetchStatus, FetchedDatum, ScoredUrl, SC_UNKNOWN};
    pub use webmill_core::error::{Error, Result};
    pub use webmill_core::sink::{JsonLinesSink, MemorySink, OutputSink};
    pub use webmill_fetcher::{FakeFetcher, Fetcher};
    pub use webmill_scheduler::{
        DomainQueue, FetchBatch, FetchRequest, FetcherPolicy, FetcherPolicyBuilder, QueueManager,
    };

    pub use crate::dispatcher::FetcherDispatcher;
}
