use chrono::Utc;
use tracing::{error, info};

use super::hub::{required, Hub};
use crate::models::{JoinMessage, LeaveMessage, ServerMessage};

/// Handle JoinMessage
pub fn handle_join_message(hub: &Hub, connection_id: &str, join_msg: JoinMessage) {
    let (Some(document_id), Some(user_id)) =
        (required(join_msg.document_id), required(join_msg.user_id))
    else {
        hub.send_error(connection_id, "Join requires documentId and userId");
        return;
    };

    if let Err(e) = hub.bind_user(connection_id, &user_id) {
        hub.send_error(connection_id, e);
        return;
    }

    info!("Join message received for document {} from user {}", document_id, user_id);
    hub.join_room(connection_id, &document_id);
    let active_users = hub.service().start_session(&document_id, &user_id);
    let info = hub.service().session_info(&document_id);

    hub.send_to(
        connection_id,
        ServerMessage::SessionInfo {
            document_id: document_id.clone(),
            user_id: user_id.clone(),
            active_users: active_users.clone(),
            locked_sections: info.locked_sections,
            session_id: connection_id.to_string(),
        },
    );
    hub.broadcast_to_room(
        &document_id,
        ServerMessage::UserJoined {
            user_id,
            user_name: join_msg.user_name,
            active_users,
            timestamp: Utc::now(),
        },
        Some(connection_id),
    );
}

/// Handle LeaveMessage
pub async fn handle_leave_message(hub: &Hub, connection_id: &str, leave_msg: LeaveMessage) {
    let Some(document_id) = required(leave_msg.document_id) else {
        hub.send_error(connection_id, "Leave requires documentId");
        return;
    };
    let Some(user_id) = hub.resolve_user(connection_id) else {
        hub.send_error(connection_id, "Join a document before leaving it");
        return;
    };

    info!("Leave message received for document {} from user {}", document_id, user_id);
    hub.leave_room(connection_id, &document_id);
    let active_users = hub.service().end_session(&document_id, &user_id);
    depart(hub, &document_id, &user_id, active_users).await;
}

/// Clean up after a closed socket.
///
/// Safe to call for connections that never joined or were already removed.
pub async fn handle_disconnect(hub: &Hub, connection_id: &str) {
    let Some(departure) = hub.remove_connection(connection_id) else {
        return;
    };
    let Some(user_id) = departure.user_id else {
        info!("Anonymous connection {} closed", connection_id);
        return;
    };

    info!("Connection {} of user {} closed", connection_id, user_id);
    // locks wait for the last connection, other tabs may still be editing
    for document_id in &departure.rooms {
        if !hub.user_in_room(&user_id, document_id) {
            let active_users = hub.service().end_presence(document_id, &user_id);
            depart(hub, document_id, &user_id, active_users).await;
        }
    }

    if departure.last_connection {
        let released = hub.service().release_all_for(&user_id);
        if released > 0 {
            info!("Released {} locks of disconnected user {}", released, user_id);
        }
    }
}

async fn depart(hub: &Hub, document_id: &str, user_id: &str, active_users: Vec<String>) {
    hub.broadcast_to_room(
        document_id,
        ServerMessage::UserLeft {
            user_id: user_id.to_string(),
            active_users,
            timestamp: Utc::now(),
        },
        None,
    );

    if let Err(e) = hub.service().flush(document_id).await {
        error!("Checkpoint of document {} failed: {}", document_id, e);
    }
}
