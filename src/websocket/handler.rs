use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::{ClientMessage, ServerMessage};
use crate::services::auth_service::AuthUser;
use crate::state::AppState;
use crate::websocket::hub::Hub;
use crate::websocket::msg_session_handler::handle_disconnect;

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
) -> Response {
    info!("New WebSocket connection attempt");
    let authenticated_user = auth.map(|Extension(AuthUser(uid))| uid);
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, authenticated_user))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, authenticated_user: Option<String>) {
    let (connection_id, mut outbox) = hub.register_connection(authenticated_user);
    info!("WebSocket connection established with connection_id: {}", connection_id);

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Drain the connection's queue into the socket
    let send_connection_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = outbox.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize message for {}: {}", send_connection_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Listen to the socket and dispatch every text frame
    let recv_hub = hub.clone();
    let recv_connection_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => recv_hub.dispatch(&recv_connection_id, msg).await,
                Err(e) => {
                    warn!("Failed to parse message on {}: {}", recv_connection_id, e);
                    recv_hub.send_to(
                        &recv_connection_id,
                        ServerMessage::error(format!("Invalid message: {}", e)),
                    );
                }
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    handle_disconnect(&hub, &connection_id).await;
    info!("WebSocket connection {} terminated", connection_id);
}
