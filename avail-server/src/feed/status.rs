//! Last-updated extraction from the upstream status page.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use scraper::{Html, Selector};

use super::error::FeedError;

/// Layout of the upstream's last-updated value, e.g. "2023-01-05 10:00:00".
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static LAST_UPDATED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span#lastUpdated").unwrap());

/// Find `<span id="lastUpdated">Label: YYYY-MM-DD HH:MM:SS</span>` and parse
/// the part after the first `": "`.
pub fn parse_last_updated(html: &str) -> Result<NaiveDateTime, FeedError> {
    let document = Html::parse_document(html);
    let element = document
        .select(&LAST_UPDATED)
        .next()
        .ok_or(FeedError::TimestampFieldMissing)?;

    let text: String = element.text().collect();
    let (_, value) = text
        .split_once(": ")
        .ok_or(FeedError::TimestampFieldMissing)?;

    parse_timestamp(value)
}

/// Parse a timestamp in the upstream's layout, ignoring surrounding whitespace.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, FeedError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| {
        FeedError::TimestampParse {
            value: value.to_string(),
            source,
        }
    })
}
