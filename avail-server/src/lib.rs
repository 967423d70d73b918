//! Course seat availability server.
//!
//! Answers "how many seats are left in this course?" from a cached,
//! periodically refreshed copy of the university's scheduler feed.

pub mod cache;
pub mod domain;
pub mod feed;
pub mod index;
pub mod web;
