use std::fmt;
use std::sync::Arc;

use webmill_core::datum::ScoredUrl;
use webmill_core::sink::OutputSink;

/// A working set of URLs released by one successful poll.
///
/// The batch remembers which domain queue it came from and carries the
/// shared output sink so the fetcher worker can append completion records
/// directly. Items are in score-descending order. A batch is released back
/// to its queue exactly once; `DomainQueue::release` consumes it by value,
/// so a second release does not compile.
pub struct FetchBatch {
    domain: String,
    items: Vec<ScoredUrl>,
    sink: Arc<dyn OutputSink>,
}

impl FetchBatch {
    pub(crate) fn new(domain: String, items: Vec<ScoredUrl>, sink: Arc<dyn OutputSink>) -> Self {
        debug_assert!(!items.is_empty(), "a fetch batch is never empty");
        Self {
            domain,
            items,
            sink,
        }
    }

    /// The domain queue this batch came from
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The released URLs, score descending
    pub fn items(&self) -> &[ScoredUrl] {
        &self.items
    }

    /// Iterate the released URLs in release order
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredUrl> {
        self.items.iter()
    }

    /// Number of URLs in the batch
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// A batch is never empty; kept for API symmetry
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Handle to the sink completion records should be appended to
    pub fn sink(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&self.sink)
    }
}

impl fmt::Debug for FetchBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchBatch")
            .field("domain", &self.domain)
            .field("items", &self.items)
            .finish()
    }
}
