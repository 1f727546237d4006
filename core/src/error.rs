use thiserror::Error;
use url::ParseError;

/// Error types shared across the webmill crates.
///
/// Recoverable scheduling conditions (a rejected offer, an empty poll) are
/// reported through return values, not through this type; `Error` covers
/// construction-time validation and the sink/IO boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Error when parsing a URL
    #[error("URL parse error: {0}")]
    UrlParse(#[from] ParseError),

    /// A URL that is empty or otherwise unusable as a fetch target
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL
        url: String,
    },

    /// A score that is not a finite number
    #[error("invalid score {score} for URL: {url}")]
    InvalidScore {
        /// The URL the score was attached to
        url: String,
        /// The offending score
        score: f64,
    },

    /// Invalid fetcher policy configuration
    #[error("policy error: {message}")]
    Policy {
        /// Error message
        message: String,
    },

    /// Error while appending a record to an output sink
    #[error("sink error: {message}")]
    Sink {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serde(String),
}

impl Error {
    /// Create a new policy error
    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy {
            message: message.into(),
        }
    }

    /// Create a new sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }
}

/// Result type for webmill operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serde(error.to_string())
    }
}
