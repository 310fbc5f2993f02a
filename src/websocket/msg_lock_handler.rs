use chrono::Utc;
use tracing::info;

use super::hub::{required, Hub};
use crate::collab::LockOutcome;
use crate::models::{LockRequestMessage, ServerMessage, UnlockRequestMessage};

/// Handle LockRequestMessage
pub fn handle_lock_request_message(hub: &Hub, connection_id: &str, lock_msg: LockRequestMessage) {
    let (Some(document_id), Some(section_id)) =
        (required(lock_msg.document_id), required(lock_msg.section_id))
    else {
        hub.send_error(connection_id, "Lock request requires documentId and sectionId");
        return;
    };
    let Some(user_id) = hub.resolve_user(connection_id) else {
        hub.send_error(connection_id, "Join a document before locking sections");
        return;
    };
    if !hub.user_in_room(&user_id, &document_id) {
        hub.send_error(connection_id, format!("Join document '{}' before locking sections in it", document_id));
        return;
    }

    match hub.service().acquire_lock(&section_id, &user_id, &document_id) {
        LockOutcome::Acquired { section_id, user_id, .. } => {
            info!("Section {} of document {} locked by {}", section_id, document_id, user_id);
            hub.send_to(
                connection_id,
                ServerMessage::SectionLocked {
                    section_id: section_id.clone(),
                    user_id: user_id.clone(),
                },
            );
            hub.broadcast_to_room(
                &document_id,
                ServerMessage::SectionLockUpdated {
                    section_id,
                    locked_by: Some(user_id),
                    timestamp: Utc::now(),
                },
                Some(connection_id),
            );
        }
        LockOutcome::Held { section_id, locked_by, since } => {
            let message = format!("Section is being edited by {}", locked_by);
            hub.send_to(
                connection_id,
                ServerMessage::LockFailed {
                    section_id,
                    locked_by,
                    since,
                    message,
                },
            );
        }
    }
}

/// Handle UnlockRequestMessage
///
/// Releasing a section the caller does not own sends nothing back.
pub fn handle_unlock_request_message(hub: &Hub, connection_id: &str, unlock_msg: UnlockRequestMessage) {
    let (Some(document_id), Some(section_id)) =
        (required(unlock_msg.document_id), required(unlock_msg.section_id))
    else {
        hub.send_error(connection_id, "Unlock request requires documentId and sectionId");
        return;
    };
    let Some(user_id) = hub.resolve_user(connection_id) else {
        hub.send_error(connection_id, "Join a document before unlocking sections");
        return;
    };
    if !hub.user_in_room(&user_id, &document_id) {
        hub.send_error(connection_id, format!("Join document '{}' before unlocking sections in it", document_id));
        return;
    }

    if hub.service().release_lock(&section_id, &user_id).is_none() {
        info!("Nothing to unlock for section {} and user {}", section_id, user_id);
        return;
    }

    hub.send_to(
        connection_id,
        ServerMessage::SectionUnlocked {
            section_id: section_id.clone(),
        },
    );
    hub.broadcast_to_room(
        &document_id,
        ServerMessage::SectionLockUpdated {
            section_id,
            locked_by: None,
            timestamp: Utc::now(),
        },
        None,
    );
}
