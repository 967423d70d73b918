//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::cache::Lookup;
use crate::domain::{CourseCode, CourseSection, TermCode};

use super::templates::{format_obtained, format_updated};

/// Term shown when the query names none.
pub const DEFAULT_TERM: &str = "202310";

/// Subject shown when the query names none.
pub const DEFAULT_DEPARTMENT: &str = "COMP";

/// Course number shown when the query names none.
pub const DEFAULT_COURSE_NUMBER: &str = "1405";

/// Query for course availability.
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityRequest {
    /// Term code, e.g. "202310"
    pub term: Option<String>,

    /// Subject, e.g. "COMP"
    pub dpt: Option<String>,

    /// Course number, e.g. "1405"
    pub code: Option<String>,
}

impl AvailabilityRequest {
    pub fn term_code(&self) -> TermCode {
        TermCode::normalized(self.term.as_deref().unwrap_or(DEFAULT_TERM))
    }

    pub fn course_code(&self) -> CourseCode {
        let dpt = self.dpt.as_deref().unwrap_or(DEFAULT_DEPARTMENT).trim();
        let number = self.code.as_deref().unwrap_or(DEFAULT_COURSE_NUMBER).trim();
        CourseCode::new(dpt, number)
    }
}

/// Availability of one course in one term.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    /// Term code as queried
    pub term: TermCode,

    /// Human-readable term, e.g. "Winter 2023"
    pub term_name: String,

    /// Course code as queried
    pub code: CourseCode,

    /// Matching sections, in feed order
    pub courses: Vec<CourseSection>,

    /// Upstream last-updated time, if known
    pub updated: Option<String>,

    /// When this server fetched the data
    pub obtained: String,

    /// Set when the data is older than intended because a refresh failed
    pub stale_error: Option<String>,
}

impl AvailabilityResponse {
    pub fn from_lookup(lookup: &Lookup) -> Self {
        let snapshot = lookup.snapshot();
        Self {
            term: lookup.term().clone(),
            term_name: lookup.term().display_name(),
            code: lookup.code().clone(),
            courses: lookup.sections().to_vec(),
            updated: snapshot.upstream_timestamp().map(|t| format_updated(&t)),
            obtained: format_obtained(&snapshot.obtained_at()),
            stale_error: lookup.stale_error().map(|e| e.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
