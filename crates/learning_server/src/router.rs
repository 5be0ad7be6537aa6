//! Router construction for the review learning server.

use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::correlation::correlation_id;
use crate::handlers::{self, fallback};
use crate::state::AppState;

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(handlers::health::health).fallback(fallback::method_not_allowed),
        )
        .route(
            "/learning/learn",
            post(handlers::learning::learn).fallback(fallback::method_not_allowed),
        )
        .route(
            "/learning/assimilate",
            post(handlers::learning::assimilate).fallback(fallback::method_not_allowed),
        )
        .route(
            "/events/decisions",
            get(handlers::decisions::list_decisions).fallback(fallback::method_not_allowed),
        )
        .fallback(fallback::not_found)
        .with_state(state)
        .layer(axum_mw::from_fn(correlation_id))
        .layer(TraceLayer::new_for_http())
}
