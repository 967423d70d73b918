//! Time-bounded cache over the course feed.
//!
//! [`CourseIndex`] holds at most one [`Snapshot`]. A lookup against a
//! snapshot younger than the TTL is answered from memory; otherwise the
//! lookup waits for a refresh. Refreshing pulls the whole feed, so the TTL
//! (15 minutes) bounds the load we put on the upstream scheduler.
//!
//! Refreshes are coalesced: however many lookups find the cache stale at
//! once, only one fetch runs. It runs on its own task, so a client that
//! gives up does not cancel the refresh for everyone else waiting on it.
//!
//! If a refresh fails while an older snapshot exists, lookups are served
//! from the older snapshot and the failure is reported alongside the result.
//! Only a cache that has never loaded surfaces the failure as an error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{CourseCode, CourseSection, TermCode};
use crate::feed::{FeedError, FeedFetcher};
use crate::index::{Snapshot, SnapshotBuilder};

/// How long a snapshot is served before the next lookup refreshes it.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Upper bound on one refresh, network and parsing included.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(120);

/// Terms requested from the upstream unless configured otherwise.
pub const DEFAULT_TERMS: [&str; 5] = ["202230", "202310", "202320", "202330", "202410"];

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum snapshot age before a lookup triggers a refresh.
    pub ttl: Duration,

    /// Maximum duration of a single refresh.
    pub refresh_timeout: Duration,

    /// Terms requested from the upstream on every refresh.
    pub terms: Vec<TermCode>,
}

impl CacheConfig {
    /// Create a config requesting the given terms, with default timings.
    pub fn new(terms: Vec<TermCode>) -> Self {
        Self {
            terms,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            terms: DEFAULT_TERMS.iter().map(|t| TermCode::new(*t)).collect(),
        }
    }
}

/// Why course data could not be produced.
///
/// Cloneable so that one failed refresh can be handed to every lookup that
/// was waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    /// The refresh failed and there is no earlier snapshot to fall back on
    #[error("course data temporarily unavailable: {0}")]
    Unavailable(Arc<FeedError>),

    /// The refresh did not finish within the configured timeout
    #[error("course data refresh timed out after {0:?}")]
    RefreshTimedOut(Duration),

    /// The refresh task panicked or was cancelled
    #[error("course data refresh aborted: {0}")]
    RefreshAborted(String),
}

/// Where the cache is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing has been loaded yet.
    Empty,
    /// The snapshot is within the TTL.
    Fresh,
    /// The snapshot is older than the TTL.
    Stale,
    /// A refresh is in flight.
    Refreshing,
}

/// Result of a lookup: matching sections plus the snapshot they came from.
#[derive(Debug, Clone)]
pub struct Lookup {
    snapshot: Arc<Snapshot>,
    term: TermCode,
    code: CourseCode,
    stale_error: Option<LookupError>,
}

impl Lookup {
    /// Matching sections in feed order; empty for unknown terms or codes.
    pub fn sections(&self) -> &[CourseSection] {
        self.snapshot.sections(&self.term, &self.code)
    }

    /// The snapshot that answered the lookup.
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn term(&self) -> &TermCode {
        &self.term
    }

    pub fn code(&self) -> &CourseCode {
        &self.code
    }

    /// The refresh failure, if this answer comes from an outdated snapshot.
    pub fn stale_error(&self) -> Option<&LookupError> {
        self.stale_error.as_ref()
    }

    pub fn is_stale(&self) -> bool {
        self.stale_error.is_some()
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<Arc<Snapshot>, LookupError>>>;

/// The published snapshot and when it was loaded.
struct Current {
    snapshot: Arc<Snapshot>,
    refreshed_at: Instant,
}

impl Current {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.refreshed_at.elapsed() <= ttl
    }
}

/// A running refresh, tagged so that only its own task clears it.
struct InFlight {
    id: u64,
    refresh: SharedRefresh,
}

#[derive(Default)]
struct State {
    current: Option<Current>,
    in_flight: Option<InFlight>,
    next_id: u64,
}

struct Inner<F> {
    fetcher: F,
    config: CacheConfig,
    state: Mutex<State>,
}

/// Cached, lazily refreshed index of course sections.
///
/// Cloning is cheap and clones share the same snapshot.
pub struct CourseIndex<F> {
    inner: Arc<Inner<F>>,
}

impl<F> Clone for CourseIndex<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: FeedFetcher> CourseIndex<F> {
    /// Create an empty index that will load from `fetcher` on first use.
    pub fn new(fetcher: F, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                config,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Sections of `code` in `term`.
    ///
    /// Refreshes first if the snapshot is missing or older than the TTL.
    /// Unknown terms and codes give an empty result, not an error.
    pub async fn lookup(&self, term: &TermCode, code: &CourseCode) -> Result<Lookup, LookupError> {
        let (snapshot, stale_error) = self.current_or_refresh().await?;
        let lookup = Lookup {
            snapshot,
            term: term.clone(),
            code: code.clone(),
            stale_error,
        };
        debug!(
            term = %term,
            code = %code,
            sections = lookup.sections().len(),
            stale = lookup.is_stale(),
            "lookup"
        );
        Ok(lookup)
    }

    /// Refresh now, regardless of snapshot age.
    ///
    /// Joins a refresh that is already running instead of starting another.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, LookupError> {
        let refresh = {
            let mut state = self.inner.lock_state();
            self.join_or_start(&mut state)
        };
        refresh.await
    }

    /// The current snapshot, without refreshing.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        let state = self.inner.lock_state();
        state.current.as_ref().map(|c| Arc::clone(&c.snapshot))
    }

    /// Upstream last-updated time of the current snapshot.
    pub fn current_upstream_timestamp(&self) -> Option<NaiveDateTime> {
        self.snapshot().and_then(|s| s.upstream_timestamp())
    }

    /// When the current snapshot was loaded.
    pub fn current_obtained_at(&self) -> Option<DateTime<Local>> {
        self.snapshot().map(|s| s.obtained_at())
    }

    /// Whether a snapshot exists and is within the TTL.
    pub fn is_fresh(&self) -> bool {
        let state = self.inner.lock_state();
        state
            .current
            .as_ref()
            .is_some_and(|c| c.is_fresh(self.inner.config.ttl))
    }

    pub fn state(&self) -> CacheState {
        let state = self.inner.lock_state();
        if state.in_flight.is_some() {
            return CacheState::Refreshing;
        }
        match &state.current {
            None => CacheState::Empty,
            Some(current) if current.is_fresh(self.inner.config.ttl) => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    /// Access the underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// The fresh snapshot, or the outcome of a refresh with stale fallback.
    async fn current_or_refresh(
        &self,
    ) -> Result<(Arc<Snapshot>, Option<LookupError>), LookupError> {
        let refresh = {
            let mut state = self.inner.lock_state();
            if let Some(current) = &state.current
                && current.is_fresh(self.inner.config.ttl)
            {
                return Ok((Arc::clone(&current.snapshot), None));
            }
            self.join_or_start(&mut state)
        };

        match refresh.await {
            Ok(snapshot) => Ok((snapshot, None)),
            Err(err) => match self.snapshot() {
                Some(previous) => {
                    warn!(
                        error = %err,
                        obtained_at = %previous.obtained_at(),
                        "refresh failed, serving previous snapshot"
                    );
                    Ok((previous, Some(err)))
                }
                None => Err(err),
            },
        }
    }

    /// Return the in-flight refresh, starting one if there is none.
    ///
    /// Called with the state lock held, so the spawned task cannot publish
    /// or clear its slot before the slot is filled.
    fn join_or_start(&self, state: &mut State) -> SharedRefresh {
        if let Some(in_flight) = &state.in_flight {
            debug!(id = in_flight.id, "joining in-flight refresh");
            return in_flight.refresh.clone();
        }

        let id = state.next_id;
        state.next_id += 1;

        let handle = tokio::spawn(Arc::clone(&self.inner).run_refresh(id));
        let refresh = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(LookupError::RefreshAborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlight {
            id,
            refresh: refresh.clone(),
        });
        refresh
    }
}

impl<F: FeedFetcher> Inner<F> {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Body of the refresh task.
    async fn run_refresh(self: Arc<Self>, id: u64) -> Result<Arc<Snapshot>, LookupError> {
        // Frees the slot on every exit path, panics included.
        let _slot = ClearInFlight { state: &self.state, id };

        info!(id, terms = self.config.terms.len(), "refreshing course data");
        let started = Instant::now();

        let fetched = tokio::time::timeout(self.config.refresh_timeout, self.fetch()).await;
        let (builder, upstream_timestamp) = match fetched {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                warn!(id, error = %e, "course data refresh failed");
                return Err(LookupError::Unavailable(Arc::new(e)));
            }
            Err(_) => {
                warn!(id, timeout = ?self.config.refresh_timeout, "course data refresh timed out");
                return Err(LookupError::RefreshTimedOut(self.config.refresh_timeout));
            }
        };

        let snapshot = self.publish(id, builder, upstream_timestamp);
        info!(
            id,
            rows = snapshot.row_count(),
            terms = snapshot.terms().count(),
            degraded_rows = snapshot.degraded_rows(),
            upstream_timestamp = ?snapshot.upstream_timestamp(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "updated course data cache"
        );
        Ok(snapshot)
    }

    /// Fetch and parse the feed into a builder.
    async fn fetch(&self) -> Result<(SnapshotBuilder, Option<NaiveDateTime>), FeedError> {
        let upstream_timestamp = match self.fetcher.fetch_upstream_timestamp().await {
            Ok(ts) => Some(ts),
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "upstream timestamp unreadable, continuing without it");
                None
            }
            Err(e) => return Err(e),
        };

        let mut rows = self.fetcher.fetch_rows(&self.config.terms).await?;
        let mut builder = SnapshotBuilder::new();
        while let Some(line) = rows.next().await {
            builder.push_line(&line?);
        }

        Ok((builder, upstream_timestamp))
    }

    /// Build the snapshot and swap it in, in one critical section.
    fn publish(
        &self,
        id: u64,
        builder: SnapshotBuilder,
        upstream_timestamp: Option<NaiveDateTime>,
    ) -> Arc<Snapshot> {
        let mut state = self.lock_state();

        let previous = state.current.as_ref().map(|c| c.snapshot.obtained_at());
        let obtained_at = not_before(Local::now(), previous);
        let snapshot = Arc::new(builder.finish(obtained_at, upstream_timestamp));

        state.current = Some(Current {
            snapshot: Arc::clone(&snapshot),
            refreshed_at: Instant::now(),
        });
        if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
            state.in_flight = None;
        }

        snapshot
    }
}

/// `now`, unless the wall clock has gone backwards past `previous`.
fn not_before(now: DateTime<Local>, previous: Option<DateTime<Local>>) -> DateTime<Local> {
    match previous {
        Some(previous) if previous > now => previous,
        _ => now,
    }
}

/// Clears the in-flight slot for refresh `id` when dropped.
struct ClearInFlight<'a> {
    state: &'a Mutex<State>,
    id: u64,
}

impl Drop for ClearInFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight.as_ref().is_some_and(|f| f.id == self.id) {
            state.in_flight = None;
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
