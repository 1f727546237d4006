use webmill_core::datum::{FetchedDatum, ScoredUrl};
use webmill_scheduler::FetcherPolicy;

mod fake;

pub use fake::FakeFetcher;

/// The transport boundary of the toolkit.
///
/// The dispatch layer sizes its worker pool from `max_threads`, builds
/// queues against `policy`, and calls `fetch` for every URL of a released
/// batch. `fetch` may block for as long as the transfer takes; it never
/// panics on transport failure, returning an `Error`-status record
/// instead.
pub trait Fetcher: Send + Sync {
    /// Number of worker threads this fetcher supports
    fn max_threads(&self) -> u32;

    /// The politeness policy this fetcher was configured with
    fn policy(&self) -> &FetcherPolicy;

    /// Fetch one URL and report the outcome
    fn fetch(&self, url: &ScoredUrl) -> FetchedDatum;
}
