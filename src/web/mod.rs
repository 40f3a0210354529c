//! Web server module
//!
//! Provides the JSON API for suggestions, inventory pass-through and status.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
