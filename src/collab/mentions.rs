use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use utoipa::ToSchema;

/// "`from_user_id` mentioned you in `document_id`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    pub id: String,
    pub from_user_id: String,
    pub document_id: String,
    #[schema(value_type = Object)]
    pub context: Value,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Per-recipient inbox of mentions, in arrival order.
#[derive(Debug, Default)]
pub struct MentionQueue {
    inboxes: HashMap<String, Vec<Mention>>,
}

fn mention_id(now: DateTime<Utc>) -> String {
    format!("mention_{}_{}", now.timestamp_millis(), uuid::Uuid::new_v4().simple())
}

impl MentionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        to_user_id: &str,
        from_user_id: &str,
        document_id: &str,
        context: Value,
        now: DateTime<Utc>,
    ) -> Mention {
        let mention = Mention {
            id: mention_id(now),
            from_user_id: from_user_id.to_string(),
            document_id: document_id.to_string(),
            context,
            created_at: now,
            read: false,
        };
        self.inboxes
            .entry(to_user_id.to_string())
            .or_default()
            .push(mention.clone());
        mention
    }

    pub fn mentions(&self, user_id: &str, unread_only: bool) -> Vec<Mention> {
        self.inboxes
            .get(user_id)
            .map(|inbox| {
                inbox
                    .iter()
                    .filter(|m| !unread_only || !m.read)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Only the recipient can mark a mention read.
    pub fn mark_read(&mut self, mention_id: &str, user_id: &str) -> bool {
        let Some(inbox) = self.inboxes.get_mut(user_id) else {
            return false;
        };
        match inbox.iter_mut().find(|m| m.id == mention_id) {
            Some(mention) => {
                mention.read = true;
                true
            }
            None => false,
        }
    }

    /// Remove mentions created at or before `now - days`. Returns how many went.
    ///
    /// A retention reaching past the representable time range removes nothing.
    pub fn purge_older_than(&mut self, days: u32, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = Duration::try_days(i64::from(days)).and_then(|d| now.checked_sub_signed(d)) else {
            return 0;
        };
        let mut removed = 0;
        for inbox in self.inboxes.values_mut() {
            let before = inbox.len();
            inbox.retain(|m| m.created_at > cutoff);
            removed += before - inbox.len();
        }
        self.inboxes.retain(|_, inbox| !inbox.is_empty());
        removed
    }

    pub fn len(&self) -> usize {
        self.inboxes.values().map(Vec::len).sum()
    }
}
