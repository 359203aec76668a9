//! `/ws` endpoint for passive listeners such as a browser overlay.
//!
//! Each connection registers a queue with the [`BroadcastHub`] and forwards whatever
//! arrives on it. Messages sent by the client are ignored.

use alloc::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use likesync_common::ListenerMessage;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{app::AppState, hub::BroadcastHub};

/// Gets called for every new listener and spins up its forwarding loop.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(AppState { hub, .. }): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| start_listener_loop(socket, hub))
}

async fn send_listener_message(
    socket: &mut WebSocket,
    msg: &ListenerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to serialize listener message: {}", e);
            Err(axum::Error::new(e))
        }
    }
}

async fn start_listener_loop(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let updates = hub.connect().await;
    let listeners = hub.listener_count().await;
    info!(listeners, "Listener connected");
    forward_updates(socket, updates).await;
}

/// One loop per listener; ends when either side goes away.
async fn forward_updates(mut socket: WebSocket, mut updates: mpsc::Receiver<ListenerMessage>) {
    loop {
        tokio::select! {
            msg = updates.recv() => {
                // The hub dropped our queue: it was full or the hub is gone.
                let Some(msg) = msg else {
                    debug!("Listener removed by the hub");
                    break;
                };
                if let Err(e) = send_listener_message(&mut socket, &msg).await {
                    warn!("Failed to send message, closing connection: {}", e);
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    info!("Listener disconnected");
                    break;
                }
                Some(Err(e)) => {
                    debug!("Listener socket error: {e}");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }
}
