//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/downloads", post(handlers::downloads))
        .route("/gethash", post(handlers::gethash))
        .route("/list", get(handlers::list_names))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
