//! Domain types for the course availability server.
//!
//! Term and course codes arrive from two untrusted places: the upstream feed
//! and user query strings. These types normalize both into the same key
//! space so that a lookup for `comp1405` finds rows indexed as `COMP1405`.

mod course;
mod term;

pub use course::{CourseCode, CourseSection};
pub use term::{Season, TermCode};
