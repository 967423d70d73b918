//! Feed row parsing.
//!
//! Rows are tab-separated with a fixed positional layout. Only a handful of
//! the fields are used; the rest (schedule, instructor, ...) are ignored.
//!
//! The feed is not always clean. Seat counts that are missing or not
//! integers are read as 0 and the row is still indexed, so one bad cell
//! costs one number rather than the whole refresh.

use tracing::debug;

use crate::domain::{CourseCode, CourseSection, TermCode};

const TERM: usize = 0;
const CRN: usize = 1;
const SUBJECT: usize = 2;
const NUMBER: usize = 3;
const SECTION: usize = 4;
const TOTAL: usize = 11;
const TAKEN: usize = 12;

/// The fields of one feed line that the index uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow<'a> {
    pub term: &'a str,
    pub crn: &'a str,
    pub subject: &'a str,
    pub number: &'a str,
    pub section: &'a str,
    pub total: i64,
    pub taken: i64,
    /// True if a seat count fell back to 0.
    pub degraded: bool,
}

impl FeedRow<'_> {
    pub fn term_code(&self) -> TermCode {
        TermCode::new(self.term)
    }

    pub fn course_code(&self) -> CourseCode {
        CourseCode::new(self.subject, self.number)
    }

    pub fn to_section(&self) -> CourseSection {
        CourseSection::new(
            self.crn,
            self.subject,
            self.number,
            self.section,
            self.total,
            self.taken,
        )
    }
}

/// Parse one line of the feed.
///
/// Returns `None` for blank lines. Missing text fields read as empty
/// strings and missing or malformed counts as 0 (see [`parse_count`]).
pub fn parse_row(line: &str) -> Option<FeedRow<'_>> {
    if line.trim().is_empty() {
        return None;
    }

    let fields: Vec<&str> = line.split('\t').collect();
    let text = |i: usize| fields.get(i).copied().unwrap_or("");

    let total = parse_count(fields.get(TOTAL).copied());
    let taken = parse_count(fields.get(TAKEN).copied());
    let degraded = total.is_none() || taken.is_none();

    if degraded {
        debug!(
            crn = text(CRN),
            total = ?fields.get(TOTAL),
            taken = ?fields.get(TAKEN),
            "malformed seat count, using 0"
        );
    }

    Some(FeedRow {
        term: text(TERM),
        crn: text(CRN),
        subject: text(SUBJECT),
        number: text(NUMBER),
        section: text(SECTION),
        total: total.unwrap_or(0),
        taken: taken.unwrap_or(0),
        degraded,
    })
}

/// Parse a seat count.
///
/// `None` means the field was missing or not an integer; callers substitute
/// 0 and record the row as degraded.
pub fn parse_count(field: Option<&str>) -> Option<i64> {
    field?.trim().parse().ok()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Free seats are always total minus taken, sign included
        #[test]
        fn free_is_total_minus_taken(total in 0i64..10_000, taken in 0i64..10_000) {
            let mut fields = vec!["x"; 13];
            let total_s = total.to_string();
            let taken_s = taken.to_string();
            fields[TOTAL] = &total_s;
            fields[TAKEN] = &taken_s;
            let line = fields.join("\t");

            let section = parse_row(&line).unwrap().to_section();
            prop_assert_eq!(section.free, total - taken);
        }

        /// No single-line input makes the parser panic
        #[test]
        fn never_panics(line in "[^\n]{0,200}") {
            let _ = parse_row(&line);
        }

        /// Garbage in a count field degrades to zero
        #[test]
        fn non_numeric_counts_are_zero(junk in "[a-zA-Z ]{1,10}") {
            let mut fields = vec!["x"; 13];
            fields[TOTAL] = &junk;
            fields[TAKEN] = &junk;
            let line = fields.join("\t");

            let parsed = parse_row(&line).unwrap();
            prop_assert_eq!(parsed.total, 0);
            prop_assert_eq!(parsed.taken, 0);
            prop_assert!(parsed.degraded);
        }
    }
}
