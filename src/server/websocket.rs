//! WebSocket subscriber connections.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AppState;

/// Upgrade and attach the connection to the device's live feed.
pub(super) async fn subscribe(
    ws: WebSocketUpgrade,
    Path(device_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, device_id, state))
}

/// Forward frames until the client leaves, a write fails, or the
/// broadcaster evicts this subscriber. Inbound frames are keep-alives.
async fn handle_socket(socket: WebSocket, device_id: String, state: AppState) {
    let (tx, mut rx) = mpsc::channel(state.subscriber_buffer.max(1));

    let Some(id) = state.bridge.subscribe(&device_id, tx) else {
        warn!(device_id = %device_id, "No broadcaster running, closing subscriber");
        return;
    };
    info!(device_id = %device_id, subscription = %id, "Subscriber connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sender.send(Message::Text(frame.to_string().into())).await {
                        debug!(subscription = %id, error = %e, "Write failed");
                        break;
                    }
                }
                None => {
                    debug!(subscription = %id, "Evicted by broadcaster");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(subscription = %id, error = %e, "Read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    state.bridge.unsubscribe(id);
    info!(device_id = %device_id, subscription = %id, "Subscriber disconnected");
}
