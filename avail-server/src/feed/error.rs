//! Feed error types.

/// Errors from fetching the upstream feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Network failure or non-success status from the upstream
    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    /// The status page no longer contains the last-updated field
    #[error("last-updated field missing from upstream status page")]
    TimestampFieldMissing,

    /// The last-updated field is present but not in the expected layout
    #[error("could not parse upstream timestamp {value:?}: {source}")]
    TimestampParse {
        value: String,
        source: chrono::ParseError,
    },

    /// Client configuration cannot be used (e.g. a malformed user agent)
    #[error("invalid feed configuration: {0}")]
    InvalidConfig(String),
}

impl FeedError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        FeedError::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Whether a refresh must be abandoned because of this error.
    ///
    /// Only a malformed timestamp is tolerated: the rows are what users come
    /// for, and the freshness label can degrade to "unknown".
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FeedError::TimestampParse { .. })
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::unavailable(err.to_string())
    }
}
