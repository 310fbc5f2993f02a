use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use super::hub::{required, Hub};
use crate::collab::NewOperation;
use crate::models::{CommentThreadMessage, ContentChangeMessage, CursorMoveMessage, ServerMessage};

/// Handle ContentChangeMessage
pub fn handle_content_change_message(hub: &Hub, connection_id: &str, change_msg: ContentChangeMessage) {
    let (Some(document_id), Some(section_id)) =
        (required(change_msg.document_id), required(change_msg.section_id))
    else {
        hub.send_error(connection_id, "Content change requires documentId and sectionId");
        return;
    };
    let Some(user_id) = hub.resolve_user(connection_id).or(required(change_msg.user_id)) else {
        hub.send_error(connection_id, "Content change requires a userId");
        return;
    };

    let op = hub.service().log_operation(NewOperation {
        document_id: document_id.clone(),
        section_id: Some(section_id.clone()),
        user_id: user_id.clone(),
        op_type: "content-change".to_string(),
        data: change_msg.change.clone(),
    });
    debug!("Operation {} logged for document {} by {}", op.id, document_id, user_id);

    hub.broadcast_to_room(
        &document_id,
        ServerMessage::ContentChanged {
            document_id: document_id.clone(),
            section_id,
            change: change_msg.change,
            user_id,
            operation_id: op.id,
            timestamp: op.timestamp,
        },
        Some(connection_id),
    );
    hub.send_to(
        connection_id,
        ServerMessage::ChangeAcknowledged {
            operation_id: op.id,
            timestamp: op.timestamp,
        },
    );
}

/// Handle CursorMoveMessage
pub fn handle_cursor_move_message(hub: &Hub, connection_id: &str, cursor_msg: CursorMoveMessage) {
    let Some(document_id) = required(cursor_msg.document_id) else {
        hub.send_error(connection_id, "Cursor move requires documentId");
        return;
    };
    let Some(user_id) = hub.resolve_user(connection_id).or(required(cursor_msg.user_id)) else {
        hub.send_error(connection_id, "Cursor move requires a userId");
        return;
    };

    hub.broadcast_to_room(
        &document_id,
        ServerMessage::CursorPositionUpdated {
            user_id,
            section_id: required(cursor_msg.section_id),
            position: cursor_msg.position,
            timestamp: Utc::now(),
        },
        Some(connection_id),
    );
}

/// Handle CommentThreadMessage
pub fn handle_comment_thread_message(hub: &Hub, connection_id: &str, thread_msg: CommentThreadMessage) {
    let (Some(document_id), Some(thread_id), Some(action)) = (
        required(thread_msg.document_id),
        required(thread_msg.thread_id),
        thread_msg.action,
    ) else {
        hub.send_error(connection_id, "Comment thread requires documentId, threadId and action");
        return;
    };
    let Some(user_id) = hub.resolve_user(connection_id) else {
        hub.send_error(connection_id, "Join a document before commenting");
        return;
    };
    let section_id = required(thread_msg.section_id);

    let op = hub.service().log_operation(NewOperation {
        document_id: document_id.clone(),
        section_id: section_id.clone(),
        user_id: user_id.clone(),
        op_type: "comment-thread".to_string(),
        data: json!({
            "threadId": &thread_id,
            "action": action,
            "commentData": &thread_msg.comment_data,
        }),
    });
    info!("Thread {} {:?} on document {} by {}", thread_id, action, document_id, user_id);

    hub.broadcast_to_room(
        &document_id,
        ServerMessage::ThreadUpdated {
            document_id: document_id.clone(),
            section_id,
            thread_id: thread_id.clone(),
            action,
            user_id,
            data: thread_msg.comment_data,
            operation_id: op.id,
            timestamp: op.timestamp,
        },
        None,
    );
    hub.send_to(
        connection_id,
        ServerMessage::ThreadAcknowledged {
            thread_id,
            action,
            timestamp: op.timestamp,
        },
    );
}
