//! Web layer for the availability server.
//!
//! One lookup endpoint, answered as HTML for browsers and JSON otherwise,
//! plus static assets for the search form.

mod dto;
mod routes;
mod state;
mod templates;

pub use dto::*;
pub use routes::{AppError, availability, create_router};
pub use state::AppState;
pub use templates::*;
