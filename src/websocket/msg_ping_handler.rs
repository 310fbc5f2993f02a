use chrono::Utc;
use tracing::{debug, error};

use super::hub::Hub;
use crate::models::ServerMessage;

/// Handle PingMessage
pub fn handle_ping_message(hub: &Hub, connection_id: &str) {
    debug!("Ping message received on connection {}", connection_id);

    // Reply with pong
    let pong = ServerMessage::Pong {
        date: Utc::now().to_rfc3339(),
    };
    if !hub.send_to(connection_id, pong) {
        error!("Failed to send Pong message on connection {}", connection_id);
    }
}
