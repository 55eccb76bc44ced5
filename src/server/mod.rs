pub mod routes;
pub mod ws;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// REST + WebSocket routes. Static assets and CORS are layered on by the binary.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(routes::get_state))
        .route("/api/params", get(routes::get_params).post(routes::post_params))
        .route("/api/result", get(routes::get_result))
        .route("/api/series/{kind}", get(routes::get_series))
        .route("/api/reset", post(routes::post_reset))
        .route("/api/counters", get(routes::get_counters))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
