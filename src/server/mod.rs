pub mod ops;
pub mod params;
pub mod routes;

use crate::state::AppState;
use axum::routing::get;
use std::sync::Arc;

/// API routes. Static files and CORS are layered on by the binary.
pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/api/pareto", get(routes::pareto))
        .route("/api/pareto/topn", get(routes::topn))
        .route("/api/pareto/abc", get(routes::abc))
        .route("/api/pareto/lorenz", get(routes::lorenz))
        .route("/api/pareto/scatter", get(routes::scatter))
        .route("/api/pareto/hist", get(routes::hist))
        .route("/api/pareto/treemap", get(routes::treemap))
        .route("/api/pareto/whatif", get(routes::whatif))
        .route("/api/pareto/export", get(routes::export))
        .route("/api/overview", get(routes::overview))
        .route("/api/counters", get(routes::get_counters))
        .route("/health", get(routes::health))
        .with_state(state)
}
