use std::collections::HashMap;

/// Tracks which users are active on which document.
///
/// Users are kept in join order. A document entry only exists while at
/// least one user is active on it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Vec<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user_id` to the document's active set and return the snapshot.
    pub fn start(&mut self, document_id: &str, user_id: &str) -> Vec<String> {
        let users = self.sessions.entry(document_id.to_string()).or_default();
        if !users.iter().any(|u| u == user_id) {
            users.push(user_id.to_string());
        }
        users.clone()
    }

    /// Remove `user_id` from the document.
    ///
    /// Returns `None` when nothing is known about the document, otherwise the
    /// users still active after the removal.
    pub fn end(&mut self, document_id: &str, user_id: &str) -> Option<Vec<String>> {
        let users = self.sessions.get_mut(document_id)?;
        users.retain(|u| u != user_id);
        if users.is_empty() {
            self.sessions.remove(document_id);
            return Some(Vec::new());
        }
        Some(users.clone())
    }

    pub fn active_users(&self, document_id: &str) -> Vec<String> {
        self.sessions.get(document_id).cloned().unwrap_or_default()
    }

    pub fn has_document(&self, document_id: &str) -> bool {
        self.sessions.contains_key(document_id)
    }

    pub fn document_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joining_twice_keeps_user_once() {
        let mut registry = SessionRegistry::new();
        registry.start("d1", "alice");
        let users = registry.start("d1", "alice");
        assert_eq!(users, vec!["alice".to_string()]);
    }

    #[test]
    fn last_leave_removes_document_entry() {
        let mut registry = SessionRegistry::new();
        registry.start("d1", "alice");
        assert_eq!(registry.end("d1", "alice"), Some(Vec::new()));
        assert!(registry.active_users("d1").is_empty());
        assert!(!registry.has_document("d1"));
        assert_eq!(registry.document_count(), 0);
    }

    #[test]
    fn leave_keeps_other_users() {
        let mut registry = SessionRegistry::new();
        registry.start("d1", "alice");
        registry.start("d1", "bob");
        assert_eq!(registry.end("d1", "alice"), Some(vec!["bob".to_string()]));
        // removing someone who is not there is harmless
        assert_eq!(registry.end("d1", "carol"), Some(vec!["bob".to_string()]));
    }

    #[test]
    fn unknown_document_is_empty() {
        let mut registry = SessionRegistry::new();
        assert!(registry.active_users("nope").is_empty());
        assert_eq!(registry.end("nope", "alice"), None);
    }
}
