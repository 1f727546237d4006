use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use url::Url;

use crate::error::{Error, Result};

/// Outcome of a fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FetchStatus {
    /// Never handed to a fetcher
    #[default]
    Unfetched,
    /// Fetched successfully
    Fetched,
    /// The fetch failed (transport or HTTP error)
    Error,
    /// Dropped from the queue when the crawl window closed
    Aborted,
}

/// HTTP status sentinel for records that never got a response
pub const SC_UNKNOWN: i32 = -1;

/// A normalized URL with its upstream-assigned priority score and an opaque
/// metadata bag.
///
/// Higher scores are more urgent. The total order is score descending with
/// the URL string as an ascending tiebreak, so a sorted run of `ScoredUrl`s
/// starts at the most urgent entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredUrl {
    url: String,
    score: f64,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl ScoredUrl {
    /// Create a new scored URL.
    ///
    /// The URL must be non-empty and syntactically valid, and the score must
    /// be finite; both are checked here so the queues can order entries
    /// without re-validating.
    pub fn new(url: impl Into<String>, score: f64) -> Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(Error::InvalidUrl { url });
        }
        Url::parse(&url)?;
        if !score.is_finite() {
            return Err(Error::InvalidScore { url, score });
        }

        Ok(Self {
            url,
            score,
            metadata: HashMap::new(),
        })
    }

    /// Attach a metadata entry
    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The normalized URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The priority score (higher = more urgent)
    pub fn score(&self) -> f64 {
        self.score
    }

    /// The opaque metadata bag, carried through to the completion record
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// The host component of the URL, the partition key for politeness
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

impl Ord for ScoredUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so that sorting ascending puts the highest score first
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.url.cmp(&other.url))
    }
}

impl PartialOrd for ScoredUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScoredUrl {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredUrl {}

/// Completion record for one URL, as appended to the output sink.
///
/// Every URL accepted by a queue eventually produces exactly one of these:
/// written by a fetcher worker after the attempt, or synthesized as an
/// abort record when the crawl window closes first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedDatum {
    /// Outcome of the attempt
    pub status: FetchStatus,

    /// HTTP status code, or [`SC_UNKNOWN`] when no response was received
    pub http_status: i32,

    /// The URL as requested
    pub base_url: String,

    /// The URL actually fetched (after redirects)
    pub fetched_url: String,

    /// When the fetch completed, in epoch milliseconds; zero for synthetic
    /// records
    pub fetch_time_ms: i64,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body
    #[serde(default)]
    pub content: Vec<u8>,

    /// Response content type
    #[serde(default)]
    pub content_type: Option<String>,

    /// Observed transfer rate in bytes per second
    #[serde(default)]
    pub response_rate: u32,

    /// Metadata bag carried over verbatim from the scored URL
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl FetchedDatum {
    /// Create a new completion record
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        status: FetchStatus,
        http_status: i32,
        base_url: impl Into<String>,
        fetched_url: impl Into<String>,
        fetch_time_ms: i64,
        headers: HashMap<String, String>,
        content: Vec<u8>,
        content_type: Option<String>,
        response_rate: u32,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            status,
            http_status,
            base_url: base_url.into(),
            fetched_url: fetched_url.into(),
            fetch_time_ms,
            headers,
            content,
            content_type,
            response_rate,
            metadata,
        }
    }

    /// Build the synthetic record for a URL still queued when the crawl
    /// window closed: status `Aborted`, unknown HTTP code, both URL fields
    /// set to the normalized URL, all timing fields zero, empty content,
    /// metadata carried through verbatim.
    pub fn aborted(url: &ScoredUrl) -> Self {
        Self::new(
            FetchStatus::Aborted,
            SC_UNKNOWN,
            url.url(),
            url.url(),
            0,
            HashMap::new(),
            Vec::new(),
            None,
            0,
            url.metadata().clone(),
        )
    }
}
