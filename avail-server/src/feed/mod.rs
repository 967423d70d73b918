//! Upstream course feed.
//!
//! The scheduler exposes two endpoints:
//! - a status page whose `#lastUpdated` span says when the feed was last
//!   regenerated ("Last Updated: 2023-01-05 10:00:00")
//! - a data endpoint that, given a list of term codes, returns one
//!   tab-separated line per scheduled section
//!
//! [`FeedFetcher`] abstracts over both so the cache can be tested against
//! [`MockFeedFetcher`] instead of the network.

mod client;
mod error;
mod fetcher;
mod mock;
mod status;

pub use client::{FeedClient, FeedConfig};
pub use error::FeedError;
pub use fetcher::{FeedFetcher, RowStream, line_stream, terms_visible};
pub use mock::MockFeedFetcher;
pub use status::{TIMESTAMP_FORMAT, parse_last_updated, parse_timestamp};
