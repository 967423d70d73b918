//! Application state for the web layer.

use crate::cache::CourseIndex;

/// Shared application state.
///
/// Generic over the feed fetcher so handlers can be exercised against the
/// mock feed.
pub struct AppState<F> {
    /// Cached course index
    pub index: CourseIndex<F>,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
        }
    }
}

impl<F> AppState<F> {
    /// Create a new app state.
    pub fn new(index: CourseIndex<F>) -> Self {
        Self { index }
    }
}
