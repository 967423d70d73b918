//! Immutable course index snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDateTime};

use crate::domain::{CourseCode, CourseSection, TermCode};

use super::parse::parse_row;

/// Sections for one term, keyed by course code.
///
/// Each bucket keeps the upstream row order. A course usually has several
/// sections (lectures, labs, tutorials) and all of them are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermIndex {
    courses: BTreeMap<CourseCode, Vec<CourseSection>>,
}

impl TermIndex {
    /// Sections of `code`, or an empty slice if the course is not offered.
    pub fn sections(&self, code: &CourseCode) -> &[CourseSection] {
        self.courses.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, code: &CourseCode) -> bool {
        self.courses.contains_key(code)
    }

    /// Course codes in this term, in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &CourseCode> {
        self.courses.keys()
    }

    /// Number of distinct courses.
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    /// Total number of sections across all courses.
    pub fn section_count(&self) -> usize {
        self.courses.values().map(Vec::len).sum()
    }

    fn push(&mut self, code: CourseCode, section: CourseSection) {
        self.courses.entry(code).or_default().push(section);
    }
}

/// One completed refresh of the feed.
///
/// Never modified after [`SnapshotBuilder::finish`]; the cache replaces the
/// whole snapshot instead.
#[derive(Debug, Clone)]
pub struct Snapshot {
    obtained_at: DateTime<Local>,
    upstream_timestamp: Option<NaiveDateTime>,
    terms: BTreeMap<TermCode, TermIndex>,
    row_count: usize,
    degraded_rows: usize,
}

impl Snapshot {
    /// Local time the refresh completed.
    pub fn obtained_at(&self) -> DateTime<Local> {
        self.obtained_at
    }

    /// When the upstream says it last regenerated the feed, if it said so
    /// in a form we could read.
    pub fn upstream_timestamp(&self) -> Option<NaiveDateTime> {
        self.upstream_timestamp
    }

    pub fn term(&self, term: &TermCode) -> Option<&TermIndex> {
        self.terms.get(term)
    }

    /// Terms present in the feed, in sorted order.
    pub fn terms(&self) -> impl Iterator<Item = &TermCode> {
        self.terms.keys()
    }

    /// Sections for `code` in `term`; empty if either is unknown.
    pub fn sections(&self, term: &TermCode, code: &CourseCode) -> &[CourseSection] {
        self.terms
            .get(term)
            .map(|index| index.sections(code))
            .unwrap_or(&[])
    }

    /// Number of rows indexed.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Rows indexed with at least one seat count read as 0.
    pub fn degraded_rows(&self) -> usize {
        self.degraded_rows
    }
}

/// Builds a [`Snapshot`] row by row.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    terms: BTreeMap<TermCode, TermIndex>,
    row_count: usize,
    degraded_rows: usize,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and index one raw feed line. Blank lines are ignored.
    pub fn push_line(&mut self, line: &str) {
        let Some(row) = parse_row(line) else {
            return;
        };

        if row.degraded {
            self.degraded_rows += 1;
        }
        self.push_section(row.term_code(), row.course_code(), row.to_section());
    }

    /// Append a section to its (term, code) bucket.
    pub fn push_section(&mut self, term: TermCode, code: CourseCode, section: CourseSection) {
        self.terms.entry(term).or_default().push(code, section);
        self.row_count += 1;
    }

    /// Number of rows indexed so far.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn finish(
        self,
        obtained_at: DateTime<Local>,
        upstream_timestamp: Option<NaiveDateTime>,
    ) -> Snapshot {
        Snapshot {
            obtained_at,
            upstream_timestamp,
            terms: self.terms,
            row_count: self.row_count,
            degraded_rows: self.degraded_rows,
        }
    }
}
