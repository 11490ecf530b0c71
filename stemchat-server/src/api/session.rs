//! GET /ws - interactive session over WebSocket

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::get,
    Router,
};

use crate::session::WebSocketTransport;
use crate::AppState;

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/ws", get(session_socket))
}

/// Upgrade and hand the socket to a fresh session
pub async fn session_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let engine = state.session_engine();
        engine.run(WebSocketTransport::new(socket)).await;
    })
}
