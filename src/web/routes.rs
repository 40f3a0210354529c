//! Route definitions

use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        // Suggestions
        .route("/suggest", get(handlers::suggest_all))
        .route("/suggest/:lens", get(handlers::suggest))
        // Inventory pass-through
        .route("/inventory/*path", get(handlers::inventory))
        // Add middleware
        .layer(cors)
        // Add state
        .with_state(state)
}
