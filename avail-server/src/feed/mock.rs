//! Mock feed fetcher for testing without the upstream.
//!
//! Serves a scripted status page and feed body, counts how often it is
//! called, and can be switched into a failing or gated mode.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Local, NaiveDateTime};
use tokio::sync::Semaphore;

use crate::domain::TermCode;

use super::error::FeedError;
use super::fetcher::{FeedFetcher, RowStream, line_stream};
use super::status::{TIMESTAMP_FORMAT, parse_last_updated};

/// Status page markup the upstream would serve for a given last-updated text.
fn status_page(last_updated: &str) -> String {
    format!(
        "<html><body><span id=\"lastUpdated\">Last Updated: {last_updated}</span></body></html>"
    )
}

/// Mock fetcher serving an in-memory feed.
///
/// The status page goes through the same parser as the real client, so a
/// malformed timestamp behaves exactly as it would upstream.
pub struct MockFeedFetcher {
    status_html: Mutex<String>,
    body: Mutex<String>,
    unavailable: AtomicBool,
    gate: Option<Arc<Semaphore>>,
    timestamp_calls: AtomicUsize,
    rows_calls: AtomicUsize,
    requested_terms: Mutex<Vec<TermCode>>,
}

impl MockFeedFetcher {
    /// Create a mock serving `body` as the feed, last updated "now".
    pub fn new(body: impl Into<String>) -> Self {
        let now = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        Self {
            status_html: Mutex::new(status_page(&now)),
            body: Mutex::new(body.into()),
            unavailable: AtomicBool::new(false),
            gate: None,
            timestamp_calls: AtomicUsize::new(0),
            rows_calls: AtomicUsize::new(0),
            requested_terms: Mutex::new(Vec::new()),
        }
    }

    /// Load the feed body from a file of tab-separated rows.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|e| {
            FeedError::InvalidConfig(format!("failed to read mock feed {path:?}: {e}"))
        })?;
        Ok(Self::new(body))
    }

    /// Report `last_updated` as the upstream timestamp.
    pub fn with_last_updated(self, last_updated: NaiveDateTime) -> Self {
        self.set_last_updated_text(&last_updated.format(TIMESTAMP_FORMAT).to_string());
        self
    }

    /// Serve `text` verbatim as the last-updated value, valid or not.
    pub fn with_last_updated_text(self, text: &str) -> Self {
        self.set_last_updated_text(text);
        self
    }

    /// Serve arbitrary markup as the status page.
    pub fn with_status_html(self, html: impl Into<String>) -> Self {
        *lock(&self.status_html) = html.into();
        self
    }

    /// Make every fetch wait for a permit from `gate` before answering.
    ///
    /// Each fetch sequence consumes one permit.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_last_updated_text(&self, text: &str) {
        *lock(&self.status_html) = status_page(text);
    }

    /// Replace the feed body served by subsequent fetches.
    pub fn set_body(&self, body: impl Into<String>) {
        *lock(&self.body) = body.into();
    }

    /// While set, both endpoints fail with `UpstreamUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of status page requests so far.
    pub fn timestamp_calls(&self) -> usize {
        self.timestamp_calls.load(Ordering::SeqCst)
    }

    /// Number of data requests so far.
    pub fn rows_calls(&self) -> usize {
        self.rows_calls.load(Ordering::SeqCst)
    }

    /// Terms named by the most recent data request.
    pub fn requested_terms(&self) -> Vec<TermCode> {
        lock(&self.requested_terms).clone()
    }

    fn check_available(&self) -> Result<(), FeedError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FeedError::unavailable("mock upstream is down"));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FeedFetcher for MockFeedFetcher {
    async fn fetch_upstream_timestamp(&self) -> Result<NaiveDateTime, FeedError> {
        self.timestamp_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| FeedError::unavailable("mock gate closed"))?
                .forget();
        }

        self.check_available()?;
        let html = lock(&self.status_html).clone();
        parse_last_updated(&html)
    }

    async fn fetch_rows(&self, terms: &[TermCode]) -> Result<RowStream, FeedError> {
        self.rows_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.requested_terms) = terms.to_vec();

        self.check_available()?;
        let body = lock(&self.body).clone();
        Ok(line_stream(Cursor::new(body.into_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use futures::TryStreamExt;
    use std::io::Write;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn serves_timestamp_and_rows() {
        let mock = MockFeedFetcher::new("row one\nrow two\n").with_last_updated(timestamp());

        assert_eq!(mock.fetch_upstream_timestamp().await.unwrap(), timestamp());

        let terms = vec![TermCode::new("202310")];
        let rows: Vec<String> = mock
            .fetch_rows(&terms)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows, vec!["row one", "row two"]);

        assert_eq!(mock.timestamp_calls(), 1);
        assert_eq!(mock.rows_calls(), 1);
        assert_eq!(mock.requested_terms(), terms);
    }

    #[tokio::test]
    async fn malformed_timestamp() {
        let mock = MockFeedFetcher::new("").with_last_updated_text("yesterday");
        let err = mock.fetch_upstream_timestamp().await.unwrap_err();
        assert!(matches!(err, FeedError::TimestampParse { .. }));
    }

    #[tokio::test]
    async fn missing_status_field() {
        let mock = MockFeedFetcher::new("").with_status_html("<html></html>");
        let err = mock.fetch_upstream_timestamp().await.unwrap_err();
        assert!(matches!(err, FeedError::TimestampFieldMissing));
    }

    #[tokio::test]
    async fn unavailable_fails_both_endpoints() {
        let mock = MockFeedFetcher::new("row\n");
        mock.set_unavailable(true);

        assert!(matches!(
            mock.fetch_upstream_timestamp().await,
            Err(FeedError::UpstreamUnavailable { .. })
        ));
        assert!(matches!(
            mock.fetch_rows(&[]).await,
            Err(FeedError::UpstreamUnavailable { .. })
        ));

        mock.set_unavailable(false);
        assert!(mock.fetch_upstream_timestamp().await.is_ok());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "202310\t12345\tCOMP\t1405\tA").unwrap();

        let mock = MockFeedFetcher::from_file(file.path()).unwrap();
        assert!(lock(&mock.body).starts_with("202310\t12345"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let result = MockFeedFetcher::from_file("/nonexistent/feed.tsv");
        assert!(matches!(result, Err(FeedError::InvalidConfig(_))));
    }
}
