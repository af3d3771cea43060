//! HTTP endpoints and the application router.
//!
//! The host API mirrors what a host can do over the WebSocket, for scripts
//! and debugging.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth;
use crate::state::{AppState, SessionSnapshot};
use crate::ws;

/// Current session state.
///
/// GET /api/state
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.snapshot().await)
}

/// Start the game, same as `host_start_game`.
///
/// POST /api/start
pub async fn start_game(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::info!("Game started via host API");
    state.start_game().await;
    (StatusCode::OK, Json(state.snapshot().await))
}

pub async fn health() -> &'static str {
    "ok"
}

/// Build the full application router
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/state", get(get_state))
        .route("/api/start", post(start_game))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::host_auth_middleware,
        ));

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health))
        .merge(api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
