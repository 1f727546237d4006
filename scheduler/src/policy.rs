use serde::{Deserialize, Serialize};

use webmill_core::error::{Error, Result};

/// Politeness policy for one crawl, shared read-only by every domain queue.
///
/// The policy is immutable after construction. `crawl_end_ms`, when set, is
/// expected to be a wall-clock instant in the future at construction time;
/// that precondition belongs to the caller, since the builder deliberately
/// never reads a clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherPolicy {
    crawl_delay_ms: u32,
    max_urls: u32,
    threads_per_host: u32,
    requests_per_batch: u32,
    crawl_end_ms: Option<i64>,
}

impl Default for FetcherPolicy {
    fn default() -> Self {
        Self {
            crawl_delay_ms: 1_000,
            max_urls: 10_000,
            threads_per_host: 1,
            requests_per_batch: 1,
            crawl_end_ms: None,
        }
    }
}

impl FetcherPolicy {
    /// Start building a policy from the defaults
    pub fn builder() -> FetcherPolicyBuilder {
        FetcherPolicyBuilder::default()
    }

    /// Minimum wall-clock gap between requests to one host, in milliseconds
    pub fn crawl_delay_ms(&self) -> u32 {
        self.crawl_delay_ms
    }

    /// Maximum number of URLs a domain queue retains
    pub fn max_urls(&self) -> u32 {
        self.max_urls
    }

    /// Maximum concurrent fetches against one host
    pub fn threads_per_host(&self) -> u32 {
        self.threads_per_host
    }

    /// Keep-alive batching hint: URLs released per poll under the
    /// single-threaded polite policy
    pub fn requests_per_batch(&self) -> u32 {
        self.requests_per_batch
    }

    /// Global crawl deadline in epoch milliseconds, if any
    pub fn crawl_end_ms(&self) -> Option<i64> {
        self.crawl_end_ms
    }

    /// Plan the next release for a queue currently holding `queue_size`
    /// URLs (`queue_size >= 1`).
    ///
    /// Releases `min(queue_size, requests_per_batch)` URLs. Under the
    /// single-threaded polite policy the host earns one crawl-delay slot per
    /// URL released, so a keep-alive batch of N pushes the next request out
    /// by N delays; with multiple threads per host no gap is enforced.
    /// Pure and deterministic for a fixed `now_ms`.
    pub fn fetch_request(&self, now_ms: i64, queue_size: usize) -> FetchRequest {
        let num_urls = queue_size.min(self.requests_per_batch as usize);
        let next_request_ms = if self.threads_per_host == 1 {
            now_ms + num_urls as i64 * i64::from(self.crawl_delay_ms)
        } else {
            now_ms
        };

        FetchRequest {
            num_urls,
            next_request_ms,
        }
    }
}

/// Builder for [`FetcherPolicy`]
#[derive(Debug, Clone, Default)]
pub struct FetcherPolicyBuilder {
    policy: FetcherPolicy,
}

impl FetcherPolicyBuilder {
    /// Set the minimum gap between requests to one host
    pub fn crawl_delay_ms(mut self, crawl_delay_ms: u32) -> Self {
        self.policy.crawl_delay_ms = crawl_delay_ms;
        self
    }

    /// Set the per-domain queue bound
    pub fn max_urls(mut self, max_urls: u32) -> Self {
        self.policy.max_urls = max_urls;
        self
    }

    /// Set the per-host concurrency bound
    pub fn threads_per_host(mut self, threads_per_host: u32) -> Self {
        self.policy.threads_per_host = threads_per_host;
        self
    }

    /// Set the keep-alive batching hint
    pub fn requests_per_batch(mut self, requests_per_batch: u32) -> Self {
        self.policy.requests_per_batch = requests_per_batch;
        self
    }

    /// Set the global crawl deadline
    pub fn crawl_end_ms(mut self, crawl_end_ms: i64) -> Self {
        self.policy.crawl_end_ms = Some(crawl_end_ms);
        self
    }

    /// Validate and build the policy
    pub fn build(self) -> Result<FetcherPolicy> {
        if self.policy.max_urls == 0 {
            return Err(Error::policy("max_urls must be at least 1"));
        }
        if self.policy.threads_per_host == 0 {
            return Err(Error::policy("threads_per_host must be at least 1"));
        }
        if self.policy.requests_per_batch == 0 {
            return Err(Error::policy("requests_per_batch must be at least 1"));
        }
        Ok(self.policy)
    }
}

/// Plan for one batch release: how many URLs to hand out now, and the
/// earliest instant the next request to this host may begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Number of URLs to release now
    pub num_urls: usize,
    /// Earliest start of the next request, in epoch milliseconds
    pub next_request_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_validation() {
        assert!(FetcherPolicy::builder().max_urls(0).build().is_err());
        assert!(FetcherPolicy::builder().threads_per_host(0).build().is_err());
        assert!(FetcherPolicy::builder()
            .requests_per_batch(0)
            .build()
            .is_err());

        let policy = FetcherPolicy::builder()
            .crawl_delay_ms(500)
            .max_urls(100)
            .crawl_end_ms(5_000)
            .build()
            .unwrap();
        assert_eq!(policy.crawl_delay_ms(), 500);
        assert_eq!(policy.max_urls(), 100);
        assert_eq!(policy.crawl_end_ms(), Some(5_000));
    }

    #[test]
    fn test_fetch_request_single_threaded() {
        let policy = FetcherPolicy::builder()
            .crawl_delay_ms(1_000)
            .requests_per_batch(1)
            .build()
            .unwrap();

        let request = policy.fetch_request(10_000, 5);
        assert_eq!(request.num_urls, 1);
        assert_eq!(request.next_request_ms, 11_000);
    }

    #[test]
    fn test_fetch_request_batching_scales_delay() {
        let policy = FetcherPolicy::builder()
            .crawl_delay_ms(1_000)
            .requests_per_batch(3)
            .build()
            .unwrap();

        // Full batch: three delay slots
        let request = policy.fetch_request(0, 10);
        assert_eq!(request.num_urls, 3);
        assert_eq!(request.next_request_ms, 3_000);

        // Queue smaller than the batching hint
        let request = policy.fetch_request(0, 2);
        assert_eq!(request.num_urls, 2);
        assert_eq!(request.next_request_ms, 2_000);
    }

    #[test]
    fn test_fetch_request_zero_delay() {
        let policy = FetcherPolicy::builder().crawl_delay_ms(0).build().unwrap();

        let request = policy.fetch_request(42, 3);
        assert_eq!(request.num_urls, 1);
        assert_eq!(request.next_request_ms, 42);
    }

    #[test]
    fn test_fetch_request_multi_threaded_has_no_gap() {
        let policy = FetcherPolicy::builder()
            .crawl_delay_ms(1_000)
            .threads_per_host(4)
            .build()
            .unwrap();

        let request = policy.fetch_request(7_000, 3);
        assert_eq!(request.num_urls, 1);
        assert_eq!(request.next_request_ms, 7_000);
    }
}
