//! `WebSocket` handler for live tick reports.
//!
//! Clients connect to `GET /ws/ticks` and receive every [`TickReport`] as a
//! JSON text frame. Lagging clients skip ahead to the newest report.
//!
//! [`TickReport`]: tycoon_core::TickReport

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// `GET /ws/ticks`
pub async fn ws_ticks(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("tick stream client connected");
    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(report) => {
                    let json = match serde_json::to_string(&report) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(tick = report.tick, error = %e, "failed to serialize tick report");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        debug!("tick stream client disconnected");
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "tick stream client lagged");
                }
                Err(RecvError::Closed) => return,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_)) | Err(_)) | None => {
                    debug!("tick stream client disconnected");
                    return;
                }
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        return;
                    }
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
