use chrono::{DateTime, Utc};

use super::mentions::Mention;
use super::oplog::Operation;

/// Domain events published by the collaboration service.
#[derive(Debug, Clone, PartialEq)]
pub enum CollabEvent {
    SessionStarted {
        document_id: String,
        user_id: String,
        active_users: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    SessionEnded {
        document_id: String,
        user_id: String,
        active_users: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    SectionLocked {
        document_id: String,
        section_id: String,
        user_id: String,
        timestamp: DateTime<Utc>,
    },
    SectionLockFailed {
        document_id: String,
        section_id: String,
        user_id: String,
        locked_by: String,
        timestamp: DateTime<Utc>,
    },
    /// `automatic` is set for bulk releases (session end, disconnect).
    SectionUnlocked {
        document_id: String,
        section_id: String,
        user_id: String,
        automatic: bool,
        timestamp: DateTime<Utc>,
    },
    OperationLogged(Operation),
    MentionCreated {
        to_user_id: String,
        mention: Mention,
    },
}

impl CollabEvent {
    pub fn document_id(&self) -> &str {
        match self {
            CollabEvent::SessionStarted { document_id, .. }
            | CollabEvent::SessionEnded { document_id, .. }
            | CollabEvent::SectionLocked { document_id, .. }
            | CollabEvent::SectionLockFailed { document_id, .. }
            | CollabEvent::SectionUnlocked { document_id, .. } => document_id,
            CollabEvent::OperationLogged(op) => &op.document_id,
            CollabEvent::MentionCreated { mention, .. } => &mention.document_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CollabEvent::SessionStarted { .. } => "session-started",
            CollabEvent::SessionEnded { .. } => "session-ended",
            CollabEvent::SectionLocked { .. } => "section-locked",
            CollabEvent::SectionLockFailed { .. } => "section-lock-failed",
            CollabEvent::SectionUnlocked { .. } => "section-unlocked",
            CollabEvent::OperationLogged(_) => "operation-logged",
            CollabEvent::MentionCreated { .. } => "mention-created",
        }
    }
}
