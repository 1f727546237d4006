pub mod clock;
pub mod counters;
pub mod datum;
pub mod error;
pub mod sink;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counters::{AtomicCounters, Counters, FetcherCounter, NullCounters};
pub use datum::{FetchStatus, FetchedDatum, ScoredUrl, SC_UNKNOWN};
pub use error::{Error, Result};
pub use sink::{JsonLinesSink, MemorySink, OutputSink};

/// Re-export commonly used crates
pub use log;
pub use serde;
pub use serde_json;
pub use url;
