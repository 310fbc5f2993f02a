use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Exclusive editing claim on a section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionLock {
    pub user_id: String,
    pub document_id: String,
    pub acquired_at: DateTime<Utc>,
}

/// Result of a lock request.
#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome {
    Acquired {
        section_id: String,
        user_id: String,
        /// Previous owner when a stale lock was taken over
        reclaimed_from: Option<String>,
    },
    Held {
        section_id: String,
        locked_by: String,
        since: DateTime<Utc>,
    },
}

impl LockOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired { .. })
    }
}

/// Per-section locks, keyed by section id.
///
/// Staleness is only evaluated when someone else asks for the section, there
/// is no background expiry.
#[derive(Debug)]
pub struct SectionLockManager {
    locks: HashMap<String, SectionLock>,
    ttl: Duration,
}

impl SectionLockManager {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            locks: HashMap::new(),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(30)),
        }
    }

    fn is_stale(&self, lock: &SectionLock, now: DateTime<Utc>) -> bool {
        now - lock.acquired_at >= self.ttl
    }

    pub fn acquire(
        &mut self,
        section_id: &str,
        user_id: &str,
        document_id: &str,
        now: DateTime<Utc>,
    ) -> LockOutcome {
        let mut reclaimed_from = None;
        if let Some(existing) = self.locks.get(section_id) {
            if existing.user_id != user_id {
                if !self.is_stale(existing, now) {
                    return LockOutcome::Held {
                        section_id: section_id.to_string(),
                        locked_by: existing.user_id.clone(),
                        since: existing.acquired_at,
                    };
                }
                reclaimed_from = Some(existing.user_id.clone());
            }
        }

        // Re-acquiring your own lock refreshes it.
        self.locks.insert(
            section_id.to_string(),
            SectionLock {
                user_id: user_id.to_string(),
                document_id: document_id.to_string(),
                acquired_at: now,
            },
        );

        LockOutcome::Acquired {
            section_id: section_id.to_string(),
            user_id: user_id.to_string(),
            reclaimed_from,
        }
    }

    /// Release a lock owned by `user_id`. Locks of other users are left alone.
    pub fn release(&mut self, section_id: &str, user_id: &str) -> Option<SectionLock> {
        match self.locks.get(section_id) {
            Some(lock) if lock.user_id == user_id => self.locks.remove(section_id),
            _ => None,
        }
    }

    /// Drop every lock held by `user_id`, returning `(section_id, lock)` pairs.
    pub fn release_all_for(&mut self, user_id: &str) -> Vec<(String, SectionLock)> {
        let sections: Vec<String> = self
            .locks
            .iter()
            .filter(|(_, lock)| lock.user_id == user_id)
            .map(|(section_id, _)| section_id.clone())
            .collect();

        sections
            .into_iter()
            .filter_map(|section_id| {
                self.locks
                    .remove(&section_id)
                    .map(|lock| (section_id, lock))
            })
            .collect()
    }

    pub fn get(&self, section_id: &str) -> Option<&SectionLock> {
        self.locks.get(section_id)
    }

    /// Locks belonging to a document, sorted by section id.
    pub fn for_document(&self, document_id: &str) -> Vec<(String, SectionLock)> {
        let mut locks: Vec<(String, SectionLock)> = self
            .locks
            .iter()
            .filter(|(_, lock)| lock.document_id == document_id)
            .map(|(section_id, lock)| (section_id.clone(), lock.clone()))
            .collect();
        locks.sort_by(|a, b| a.0.cmp(&b.0));
        locks
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }
}
