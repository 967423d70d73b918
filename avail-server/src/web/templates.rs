//! Askama templates for the web frontend.

use askama::Template;
use chrono::{DateTime, Local, NaiveDateTime};

use crate::cache::Lookup;
use crate::domain::CourseSection;

/// Format of the upstream last-updated time on pages and in JSON.
const UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the fetch time, with the server's offset.
const OBTAINED_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

pub fn format_updated(timestamp: &NaiveDateTime) -> String {
    timestamp.format(UPDATED_FORMAT).to_string()
}

pub fn format_obtained(timestamp: &DateTime<Local>) -> String {
    timestamp.format(OBTAINED_FORMAT).to_string()
}

/// Availability results page.
#[derive(Template)]
#[template(path = "availability.html")]
pub struct AvailabilityTemplate {
    pub term: String,
    pub term_name: String,
    pub code: String,
    pub sections: Vec<SectionView>,
    pub updated: String,
    pub obtained: String,
    pub warning: Option<String>,
}

impl AvailabilityTemplate {
    pub fn from_lookup(lookup: &Lookup) -> Self {
        let snapshot = lookup.snapshot();
        Self {
            term: lookup.term().to_string(),
            term_name: lookup.term().display_name(),
            code: lookup.code().to_string(),
            sections: lookup.sections().iter().map(SectionView::from_section).collect(),
            updated: snapshot
                .upstream_timestamp()
                .map(|t| format_updated(&t))
                .unwrap_or_else(|| "unknown".to_string()),
            obtained: format_obtained(&snapshot.obtained_at()),
            warning: lookup.stale_error().map(|e| e.to_string()),
        }
    }
}

/// Error page.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub message: String,
}

/// One section row.
#[derive(Debug, Clone)]
pub struct SectionView {
    pub crn: String,
    pub name: String,
    pub total: i64,
    pub taken: i64,
    pub free: i64,
    pub is_full: bool,
}

impl SectionView {
    pub fn from_section(section: &CourseSection) -> Self {
        Self {
            crn: section.crn.clone(),
            name: section.display_name.clone(),
            total: section.total,
            taken: section.taken,
            free: section.free,
            is_full: section.is_full(),
        }
    }

    /// Seats over capacity, shown instead of a negative free count.
    pub fn overflow(&self) -> i64 {
        (-self.free).max(0)
    }
}
