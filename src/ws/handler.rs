//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Response};

use super::session::ClientSession;
use crate::app_state::AppState;
use crate::error::RelayError;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// Applies the inbound size cap to both frames and messages, then hands the
/// socket to a fresh [`ClientSession`].
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.hub.is_closed() {
        return RelayError::HubStopped.into_response();
    }

    let limits = state.limits;
    let session = ClientSession::new(state.hub.clone(), limits);
    tracing::debug!(client_id = %session.client_id(), "upgrading connection");

    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_message_size)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| session.run(socket))
}
