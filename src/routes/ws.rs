use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::ws;
use crate::state::AppState;
use std::sync::Arc;

/// Create the WebSocket router.
///
/// The `/listen` endpoint is intentionally unauthenticated: connections are
/// short-lived, audio is ephemeral, and deployments that need access control
/// are expected to terminate it at a reverse proxy in front of this service.
pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/listen", get(ws::ws_listen_handler))
        .layer(TraceLayer::new_for_http())
}
