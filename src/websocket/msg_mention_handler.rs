use chrono::Utc;
use tracing::{info, warn};

use super::hub::{required, Hub};
use crate::models::{MentionMessage, ServerMessage};

/// Handle MentionMessage
pub fn handle_mention_message(hub: &Hub, connection_id: &str, mention_msg: MentionMessage) {
    let (Some(document_id), Some(to_user_id), Some(from_user_id)) = (
        required(mention_msg.document_id),
        required(mention_msg.to_user_id),
        required(mention_msg.from_user_id),
    ) else {
        hub.send_error(connection_id, "Mention requires documentId, toUserId and fromUserId");
        return;
    };

    // the sender must be who they claim to be
    if hub.resolve_user(connection_id).as_deref() != Some(from_user_id.as_str()) {
        warn!(
            "Connection {} tried to mention {} on behalf of {}",
            connection_id, to_user_id, from_user_id
        );
        hub.send_error(connection_id, "Cannot send a mention on behalf of another user");
        return;
    }

    let mention = hub.service().add_mention(
        &to_user_id,
        &from_user_id,
        &document_id,
        mention_msg.context.clone(),
    );
    let timestamp = Utc::now();
    let delivered = hub.send_to_user(
        &to_user_id,
        ServerMessage::YouWereMentioned {
            by: required(mention_msg.from_name),
            document_id,
            context: mention_msg.context,
            mention: mention.clone(),
            timestamp,
        },
    );
    info!(
        "Mention {} from {} delivered to {} connections of {}",
        mention.id, from_user_id, delivered, to_user_id
    );

    hub.send_to(
        connection_id,
        ServerMessage::MentionSent {
            mention_id: mention.id,
            mentioned_user_id: to_user_id,
            timestamp,
        },
    );
}
