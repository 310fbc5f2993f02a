use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collab::{LockedSection, Mention};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JoinMessage {
    pub document_id: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeaveMessage {
    pub document_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentChangeMessage {
    pub document_id: Option<String>,
    pub section_id: Option<String>,
    #[serde(default)]
    pub change: Value,
    pub user_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LockRequestMessage {
    pub document_id: Option<String>,
    pub section_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRequestMessage {
    pub document_id: Option<String>,
    pub section_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CursorMoveMessage {
    pub document_id: Option<String>,
    pub section_id: Option<String>,
    #[serde(default)]
    pub position: Value,
    pub user_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MentionMessage {
    pub document_id: Option<String>,
    pub to_user_id: Option<String>,
    pub from_user_id: Option<String>,
    pub from_name: Option<String>,
    #[serde(default)]
    pub context: Value,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreadAction {
    Create,
    Reply,
    Resolve,
    Reopen,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadMessage {
    pub document_id: Option<String>,
    pub section_id: Option<String>,
    pub thread_id: Option<String>,
    pub action: Option<ThreadAction>,
    #[serde(default)]
    pub comment_data: Value,
}

/// Messages sent by clients over the socket.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Join(JoinMessage),
    Leave(LeaveMessage),
    ContentChange(ContentChangeMessage),
    LockRequest(LockRequestMessage),
    UnlockRequest(UnlockRequestMessage),
    CursorMove(CursorMoveMessage),
    Mention(MentionMessage),
    CommentThread(CommentThreadMessage),
    Ping,
}

/// Messages pushed to clients.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    SessionInfo {
        document_id: String,
        user_id: String,
        active_users: Vec<String>,
        locked_sections: Vec<LockedSection>,
        session_id: String,
    },
    UserJoined {
        user_id: String,
        user_name: Option<String>,
        active_users: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    UserLeft {
        user_id: String,
        active_users: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    ContentChanged {
        document_id: String,
        section_id: String,
        change: Value,
        user_id: String,
        operation_id: u64,
        timestamp: DateTime<Utc>,
    },
    ChangeAcknowledged {
        operation_id: u64,
        timestamp: DateTime<Utc>,
    },
    SectionLocked {
        section_id: String,
        user_id: String,
    },
    LockFailed {
        section_id: String,
        locked_by: String,
        since: DateTime<Utc>,
        message: String,
    },
    /// `locked_by: None` means the section is free again.
    SectionLockUpdated {
        section_id: String,
        locked_by: Option<String>,
        timestamp: DateTime<Utc>,
    },
    SectionUnlocked {
        section_id: String,
    },
    CursorPositionUpdated {
        user_id: String,
        section_id: Option<String>,
        position: Value,
        timestamp: DateTime<Utc>,
    },
    YouWereMentioned {
        by: Option<String>,
        document_id: String,
        context: Value,
        mention: Mention,
        timestamp: DateTime<Utc>,
    },
    MentionSent {
        mention_id: String,
        mentioned_user_id: String,
        timestamp: DateTime<Utc>,
    },
    ThreadUpdated {
        document_id: String,
        section_id: Option<String>,
        thread_id: String,
        action: ThreadAction,
        user_id: String,
        data: Value,
        operation_id: u64,
        timestamp: DateTime<Utc>,
    },
    ThreadAcknowledged {
        thread_id: String,
        action: ThreadAction,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
    Pong {
        date: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
