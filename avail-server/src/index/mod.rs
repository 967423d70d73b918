//! Parsed, queryable form of the course feed.
//!
//! A [`Snapshot`] is built from scratch on every refresh by feeding raw lines
//! through a [`SnapshotBuilder`], then published whole. Nothing in this
//! module is shared or mutable once built.

mod parse;
mod snapshot;

pub use parse::{FeedRow, parse_count, parse_row};
pub use snapshot::{Snapshot, SnapshotBuilder, TermIndex};
