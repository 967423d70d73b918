//! Term codes and their human-readable names.

use std::fmt;

use serde::Serialize;

/// Academic session encoded in the last two digits of a term code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Season {
    Winter,
    Summer,
    Fall,
    Unknown,
}

impl Season {
    /// Map a term suffix (`termCode % 100`) to a season.
    pub fn from_suffix(suffix: i64) -> Self {
        match suffix {
            10 => Season::Winter,
            20 => Season::Summer,
            30 => Season::Fall,
            _ => Season::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw term code such as `202310` (year 2023, suffix 10 = Winter).
///
/// Term codes are stored verbatim: the feed is the authority on which
/// codes exist, and a lookup for a code the feed never mentioned simply
/// finds nothing. Only [`TermCode::display_name`] interprets the digits.
///
/// # Examples
///
/// ```
/// use avail_server::domain::TermCode;
///
/// let term = TermCode::new("202330");
/// assert_eq!(term.display_name(), "Fall 2023");
///
/// // Codes that are not numeric still render, as "Unknown 0"
/// assert_eq!(TermCode::new("soon").display_name(), "Unknown 0");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TermCode(String);

impl TermCode {
    /// Wrap a term code exactly as given.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Normalize user input: surrounding whitespace is dropped and letters
    /// are upper-cased.
    pub fn normalized(code: &str) -> Self {
        Self(code.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the code, or 0 if it is not an integer.
    fn numeric(&self) -> i64 {
        self.0.parse().unwrap_or(0)
    }

    /// Calendar year (`termCode / 100`).
    pub fn year(&self) -> i64 {
        self.numeric() / 100
    }

    /// Session suffix (`termCode % 100`).
    pub fn suffix(&self) -> i64 {
        self.numeric() % 100
    }

    pub fn season(&self) -> Season {
        Season::from_suffix(self.suffix())
    }

    /// Human-readable name, e.g. "Winter 2023".
    pub fn display_name(&self) -> String {
        format!("{} {}", self.season(), self.year())
    }
}

impl fmt::Debug for TermCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TermCode({})", self.0)
    }
}

impl fmt::Display for TermCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_seasons() {
        assert_eq!(TermCode::new("202310").display_name(), "Winter 2023");
        assert_eq!(TermCode::new("202320").display_name(), "Summer 2023");
        assert_eq!(TermCode::new("202330").display_name(), "Fall 2023");
    }

    #[test]
    fn unknown_suffix() {
        assert_eq!(TermCode::new("202340").display_name(), "Unknown 2023");
        assert_eq!(TermCode::new("202300").season(), Season::Unknown);
    }

    #[test]
    fn non_numeric_code() {
        let term = TermCode::new("");
        assert_eq!(term.year(), 0);
        assert_eq!(term.display_name(), "Unknown 0");
    }

    #[test]
    fn normalized_trims_and_uppercases() {
        assert_eq!(TermCode::normalized(" 202310 ").as_str(), "202310");
        assert_eq!(TermCode::normalized("abc").as_str(), "ABC");
    }

    #[test]
    fn debug_and_display() {
        let term = TermCode::new("202410");
        assert_eq!(format!("{term}"), "202410");
        assert_eq!(format!("{term:?}"), "TermCode(202410)");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&TermCode::new("202310")).unwrap();
        assert_eq!(json, "\"202310\"");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Year and suffix recompose into the code
        #[test]
        fn year_and_suffix_recompose(year in 1900i64..2100, suffix in 0i64..100) {
            let term = TermCode::new(format!("{year}{suffix:02}"));
            prop_assert_eq!(term.year(), year);
            prop_assert_eq!(term.suffix(), suffix);
        }

        /// The display name always ends with the year
        #[test]
        fn display_name_ends_with_year(year in 1900i64..2100, suffix in 0i64..100) {
            let term = TermCode::new(format!("{year}{suffix:02}"));
            let name = term.display_name();
            let expected_suffix = format!(" {year}");
            prop_assert!(name.ends_with(&expected_suffix));
        }

        /// Only the three known suffixes name a season
        #[test]
        fn only_known_suffixes_have_names(suffix in 0i64..100) {
            let season = Season::from_suffix(suffix);
            let known = matches!(suffix, 10 | 20 | 30);
            prop_assert_eq!(season != Season::Unknown, known);
        }
    }
}
