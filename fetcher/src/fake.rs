use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, trace, warn};
use rand::Rng;
use url::Url;

use webmill_core::clock::{Clock, SystemClock};
use webmill_core::datum::{FetchStatus, FetchedDatum, ScoredUrl, SC_UNKNOWN};
use webmill_scheduler::FetcherPolicy;

use crate::Fetcher;

const DEFAULT_STATUS: i32 = 200;
const DEFAULT_CONTENT_SIZE: usize = 10_000;
const DEFAULT_BYTES_PER_SECOND: usize = 100_000;

/// A fetcher that performs no network I/O.
///
/// In random mode the content size and transfer rate are jittered around
/// the defaults; in deterministic mode they are read off the URL's query
/// string (`status`, `size`, `speed`), which lets a test script the exact
/// outcome per URL. Either way the fetch sleeps for as long as the modeled
/// transfer would take.
pub struct FakeFetcher {
    random_fetching: bool,
    max_threads: u32,
    policy: FetcherPolicy,
    clock: Arc<dyn Clock>,
}

impl FakeFetcher {
    /// Create a fetcher with jittered sizes and rates
    pub fn random(max_threads: u32, policy: FetcherPolicy) -> Self {
        Self {
            random_fetching: true,
            max_threads,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a fetcher scripted by URL query parameters
    pub fn deterministic(max_threads: u32, policy: FetcherPolicy) -> Self {
        Self {
            random_fetching: false,
            max_threads,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to stamp fetch times
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn error_datum(&self, url: &ScoredUrl) -> FetchedDatum {
        FetchedDatum::new(
            FetchStatus::Error,
            SC_UNKNOWN,
            url.url(),
            url.url(),
            self.clock.epoch_millis(),
            HashMap::new(),
            Vec::new(),
            None,
            0,
            url.metadata().clone(),
        )
    }
}

impl Fetcher for FakeFetcher {
    fn max_threads(&self) -> u32 {
        self.max_threads
    }

    fn policy(&self) -> &FetcherPolicy {
        &self.policy
    }

    fn fetch(&self, scored_url: &ScoredUrl) -> FetchedDatum {
        let parsed = match Url::parse(scored_url.url()) {
            Ok(parsed) => parsed,
            Err(parse_error) => {
                error!("unfetchable url {}: {}", scored_url.url(), parse_error);
                return self.error_datum(scored_url);
            }
        };

        let mut status_code = DEFAULT_STATUS;
        let mut content_size = DEFAULT_CONTENT_SIZE;
        let mut bytes_per_second = DEFAULT_BYTES_PER_SECOND;

        if self.random_fetching {
            let mut rng = rand::thread_rng();
            content_size = rng.gen_range(100..=2 * DEFAULT_CONTENT_SIZE);
            bytes_per_second = rng.gen_range(10_000..=DEFAULT_BYTES_PER_SECOND);
        } else {
            for (key, value) in parsed.query_pairs() {
                match key.as_ref() {
                    "status" => status_code = value.parse().unwrap_or(DEFAULT_STATUS),
                    "size" => content_size = value.parse().unwrap_or(DEFAULT_CONTENT_SIZE),
                    "speed" => {
                        bytes_per_second = value.parse().unwrap_or(DEFAULT_BYTES_PER_SECOND)
                    }
                    _ => warn!("unknown fake url parameter: {}", key),
                }
            }
        }

        let status = if status_code == 200 {
            FetchStatus::Fetched
        } else {
            FetchStatus::Error
        };

        // Take as long as filling in the data would.
        let duration_secs = content_size as f64 / bytes_per_second.max(1) as f64;
        trace!(
            "fake fetching {} bytes at {} bps ({:.3}s) from {}",
            content_size,
            bytes_per_second,
            duration_secs,
            scored_url.url()
        );
        thread::sleep(Duration::from_secs_f64(duration_secs));

        FetchedDatum::new(
            status,
            status_code,
            scored_url.url(),
            scored_url.url(),
            self.clock.epoch_millis(),
            HashMap::new(),
            vec![0; content_size],
            Some("text/html".to_string()),
            bytes_per_second as u32,
            scored_url.metadata().clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_url(path: &str, status: i32) -> ScoredUrl {
        ScoredUrl::new(
            format!("https://example.com/{path}?status={status}&size=100&speed=1000000"),
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_deterministic_fetch_success() {
        let fetcher = FakeFetcher::deterministic(1, FetcherPolicy::default());
        let url = fast_url("ok", 200).with_metadata("shard", "2");

        let datum = fetcher.fetch(&url);
        assert_eq!(datum.status, FetchStatus::Fetched);
        assert_eq!(datum.http_status, 200);
        assert_eq!(datum.content.len(), 100);
        assert_eq!(datum.content_type.as_deref(), Some("text/html"));
        assert_eq!(datum.metadata.get("shard").unwrap(), "2");
    }

    #[test]
    fn test_deterministic_fetch_error_status() {
        let fetcher = FakeFetcher::deterministic(1, FetcherPolicy::default());
        let datum = fetcher.fetch(&fast_url("missing", 404));

        assert_eq!(datum.status, FetchStatus::Error);
        assert_eq!(datum.http_status, 404);
    }

    #[test]
    fn test_random_fetch_completes() {
        let fetcher = FakeFetcher::random(2, FetcherPolicy::default());
        assert_eq!(fetcher.max_threads(), 2);

        let url = ScoredUrl::new("https://example.com/any", 1.0).unwrap();
        let datum = fetcher.fetch(&url);
        assert_eq!(datum.base_url, "https://example.com/any");
        assert!(!datum.content.is_empty());
    }
}
