//! Axum router construction for the status API.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the status API router.
///
/// - `GET /health` -- liveness check
/// - `GET /api/status` -- engine summary and latest tick report
/// - `GET /api/progress` -- last persisted progress record
/// - `GET /api/history` -- recent tick reports
/// - `GET /ws/ticks` -- live tick report stream
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/status", get(handlers::get_status))
        .route("/api/progress", get(handlers::get_progress))
        .route("/api/history", get(handlers::get_history))
        .route("/ws/ticks", get(ws::ws_ticks))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
