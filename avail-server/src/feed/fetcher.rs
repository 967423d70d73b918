//! The fetcher abstraction and helpers shared by its implementations.

use std::future::Future;

use chrono::NaiveDateTime;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::domain::TermCode;

use super::error::FeedError;

/// Lazy, single-pass sequence of raw feed lines.
pub type RowStream = BoxStream<'static, Result<String, FeedError>>;

/// Source of the upstream feed.
///
/// One refresh calls [`fetch_upstream_timestamp`](FeedFetcher::fetch_upstream_timestamp)
/// then [`fetch_rows`](FeedFetcher::fetch_rows). Both futures must be `Send`
/// because refreshes run on a spawned task.
pub trait FeedFetcher: Send + Sync + 'static {
    /// When the upstream last regenerated its feed.
    fn fetch_upstream_timestamp(
        &self,
    ) -> impl Future<Output = Result<NaiveDateTime, FeedError>> + Send;

    /// Request rows for the given terms.
    ///
    /// Terms the upstream does not know are silently absent from the result.
    fn fetch_rows(
        &self,
        terms: &[TermCode],
    ) -> impl Future<Output = Result<RowStream, FeedError>> + Send;
}

/// Format terms the way the data endpoint expects: `[202310, 202320]`.
pub fn terms_visible(terms: &[TermCode]) -> String {
    let joined = terms
        .iter()
        .map(TermCode::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{joined}]")
}

/// Split a byte source into lines as it is read.
///
/// Line endings (`\n` or `\r\n`) are stripped. Bytes that are not valid
/// UTF-8 are replaced rather than failing the whole feed; a read error ends
/// the stream with [`FeedError::UpstreamUnavailable`].
pub fn line_stream<R>(reader: R) -> RowStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    futures::stream::try_unfold(reader.split(b'\n'), |mut segments| async move {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes);
                let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
                Ok(Some((line, segments)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(FeedError::unavailable(format!("reading feed body: {e}"))),
        }
    })
    .boxed()
}
