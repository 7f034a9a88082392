//! Live stream: WebSocket fan-out of accepted items at the service root.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::AppState;
use crate::subscriptions::BroadcastHub;

/// Handle `GET /` — upgrade to the live stream, or answer a plain status
/// line for ordinary requests.
pub async fn handle_root(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Some(upgrade) => {
            let hub = state.hub.clone();
            upgrade.on_upgrade(move |socket| stream_items(socket, hub))
        }
        None => "Telemetry emulator running".into_response(),
    }
}

/// Forward broadcast messages to one socket until either side goes away.
///
/// Inbound frames are ignored; the read half exists only to detect
/// disconnection, which is the sole lifecycle-ending signal for a
/// subscriber.
async fn stream_items(mut socket: WebSocket, hub: Arc<BroadcastHub>) {
    let mut handle = hub.subscribe();

    loop {
        tokio::select! {
            message = handle.recv() => {
                match message {
                    Some(payload) => {
                        if socket.send(Message::Text(payload.to_string())).await.is_err() {
                            break;
                        }
                    }
                    // Dropped by the hub (lagging subscriber).
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    hub.unsubscribe(handle.id);
}
