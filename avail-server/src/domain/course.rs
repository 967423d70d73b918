//! Course codes and scheduled sections.

use std::fmt;

use serde::Serialize;

/// An upper-cased course code: subject and number with no separator.
///
/// # Examples
///
/// ```
/// use avail_server::domain::CourseCode;
///
/// let code = CourseCode::new("comp", "1405");
/// assert_eq!(code.as_str(), "COMP1405");
/// assert_eq!(code, CourseCode::normalized("Comp1405"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CourseCode(String);

impl CourseCode {
    /// Join a subject and course number into a code.
    pub fn new(subject: &str, number: &str) -> Self {
        Self(format!("{subject}{number}").to_uppercase())
    }

    /// Normalize an already joined code.
    pub fn normalized(code: &str) -> Self {
        Self(code.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CourseCode({})", self.0)
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One scheduled offering of a course.
///
/// `free` is `total - taken` and is negative when a section is
/// over-enrolled. The registrar does let that happen, so it is kept as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseSection {
    /// Course registration number
    pub crn: String,

    /// Seat capacity
    pub total: i64,

    /// Seats taken
    pub taken: i64,

    /// Seats remaining
    pub free: i64,

    /// "SUBJ NUMBER SECTION", e.g. "COMP 1405 A"
    pub display_name: String,
}

impl CourseSection {
    pub fn new(
        crn: impl Into<String>,
        subject: &str,
        number: &str,
        section: &str,
        total: i64,
        taken: i64,
    ) -> Self {
        Self {
            crn: crn.into(),
            total,
            taken,
            free: total.saturating_sub(taken),
            display_name: format!("{subject} {number} {section}"),
        }
    }

    pub fn is_full(&self) -> bool {
        self.free <= 0
    }
}
