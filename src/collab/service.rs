use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use utoipa::ToSchema;

use super::events::CollabEvent;
use super::locks::{LockOutcome, SectionLock, SectionLockManager};
use super::mentions::{Mention, MentionQueue};
use super::oplog::{NewOperation, Operation, OperationLog};
use super::registry::SessionRegistry;
use crate::db::{OperationStore, StoreError};

/// Tunables for [`CollabService`].
#[derive(Debug, Clone)]
pub struct CollabSettings {
    pub lock_ttl: Duration,
    pub op_log_capacity: usize,
    pub event_channel_capacity: usize,
}

impl Default for CollabSettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(30),
            op_log_capacity: 10_000,
            event_channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockedSection {
    pub section_id: String,
    pub locked_by: String,
    pub since: DateTime<Utc>,
}

/// Who is on a document and which of its sections are locked.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub document_id: String,
    pub active_users: Vec<String>,
    pub locked_sections: Vec<LockedSection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollabStats {
    pub documents: usize,
    pub locks: usize,
    pub operations: usize,
    pub mentions: usize,
}

struct CollabState {
    sessions: SessionRegistry,
    locks: SectionLockManager,
    oplog: OperationLog,
    mentions: MentionQueue,
}

/// Owns the session, lock, operation and mention state of the process.
///
/// Every method takes the state mutex for the duration of one synchronous
/// mutation. Store I/O happens after the mutex has been released.
pub struct CollabService {
    state: Mutex<CollabState>,
    events: broadcast::Sender<CollabEvent>,
    store: Arc<dyn OperationStore>,
}

impl CollabService {
    pub fn new(settings: CollabSettings, store: Arc<dyn OperationStore>) -> Self {
        let (events, _) = broadcast::channel(settings.event_channel_capacity.max(1));
        Self {
            state: Mutex::new(CollabState {
                sessions: SessionRegistry::new(),
                locks: SectionLockManager::new(settings.lock_ttl),
                oplog: OperationLog::new(settings.op_log_capacity),
                mentions: MentionQueue::new(),
            }),
            events,
            store,
        }
    }

    fn state(&self) -> MutexGuard<'_, CollabState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CollabEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            debug!("No subscribers for collaboration event {}", name);
        }
    }

    /// Subscribe to the domain events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CollabEvent> {
        self.events.subscribe()
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn start_session(&self, document_id: &str, user_id: &str) -> Vec<String> {
        let active_users = self.state().sessions.start(document_id, user_id);
        info!("User {} joined document {}", user_id, document_id);
        self.emit(CollabEvent::SessionStarted {
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            active_users: active_users.clone(),
            timestamp: Utc::now(),
        });
        active_users
    }

    /// Remove the user from the document and release every lock they hold.
    ///
    /// Unknown documents are a no-op returning an empty list.
    pub fn end_session(&self, document_id: &str, user_id: &str) -> Vec<String> {
        let (active_users, released) = {
            let mut state = self.state();
            match state.sessions.end(document_id, user_id) {
                Some(active_users) => {
                    let released = state.locks.release_all_for(user_id);
                    (active_users, released)
                }
                None => return Vec::new(),
            }
        };

        self.emit_auto_unlocks(user_id, released);
        info!("User {} left document {}", user_id, document_id);
        self.emit(CollabEvent::SessionEnded {
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            active_users: active_users.clone(),
            timestamp: Utc::now(),
        });
        active_users
    }

    /// Remove the user from one document only, keeping every lock they hold.
    ///
    /// Used when one of several connections of the user goes away.
    pub fn end_presence(&self, document_id: &str, user_id: &str) -> Vec<String> {
        let Some(active_users) = self.state().sessions.end(document_id, user_id) else {
            return Vec::new();
        };

        info!("User {} is no longer present on document {}", user_id, document_id);
        self.emit(CollabEvent::SessionEnded {
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            active_users: active_users.clone(),
            timestamp: Utc::now(),
        });
        active_users
    }

    pub fn active_users(&self, document_id: &str) -> Vec<String> {
        self.state().sessions.active_users(document_id)
    }

    pub fn acquire_lock(&self, section_id: &str, user_id: &str, document_id: &str) -> LockOutcome {
        self.acquire_lock_at(section_id, user_id, document_id, Utc::now())
    }

    pub(crate) fn acquire_lock_at(
        &self,
        section_id: &str,
        user_id: &str,
        document_id: &str,
        now: DateTime<Utc>,
    ) -> LockOutcome {
        let outcome = self
            .state()
            .locks
            .acquire(section_id, user_id, document_id, now);

        match &outcome {
            LockOutcome::Acquired { reclaimed_from, .. } => {
                if let Some(previous) = reclaimed_from {
                    info!(
                        "Section {} reclaimed from stale lock of {} by {}",
                        section_id, previous, user_id
                    );
                }
                self.emit(CollabEvent::SectionLocked {
                    document_id: document_id.to_string(),
                    section_id: section_id.to_string(),
                    user_id: user_id.to_string(),
                    timestamp: now,
                });
            }
            LockOutcome::Held { locked_by, .. } => {
                debug!(
                    "Section {} lock denied to {}, held by {}",
                    section_id, user_id, locked_by
                );
                self.emit(CollabEvent::SectionLockFailed {
                    document_id: document_id.to_string(),
                    section_id: section_id.to_string(),
                    user_id: user_id.to_string(),
                    locked_by: locked_by.clone(),
                    timestamp: now,
                });
            }
        }
        outcome
    }

    /// Release a lock owned by the caller. `None` means there was nothing to release.
    pub fn release_lock(&self, section_id: &str, user_id: &str) -> Option<SectionLock> {
        let released = self.state().locks.release(section_id, user_id)?;
        self.emit(CollabEvent::SectionUnlocked {
            document_id: released.document_id.clone(),
            section_id: section_id.to_string(),
            user_id: user_id.to_string(),
            automatic: false,
            timestamp: Utc::now(),
        });
        Some(released)
    }

    /// Release every lock held by the user, returning how many were dropped.
    pub fn release_all_for(&self, user_id: &str) -> usize {
        let released = self.state().locks.release_all_for(user_id);
        let count = released.len();
        self.emit_auto_unlocks(user_id, released);
        count
    }

    fn emit_auto_unlocks(&self, user_id: &str, released: Vec<(String, SectionLock)>) {
        let now = Utc::now();
        for (section_id, lock) in released {
            self.emit(CollabEvent::SectionUnlocked {
                document_id: lock.document_id,
                section_id,
                user_id: user_id.to_string(),
                automatic: true,
                timestamp: now,
            });
        }
    }

    pub fn log_operation(&self, op: NewOperation) -> Operation {
        let logged = self.state().oplog.append(op, Utc::now());
        self.emit(CollabEvent::OperationLogged(logged.clone()));
        logged
    }

    /// Most recent first.
    pub fn history(&self, document_id: &str, limit: usize) -> Vec<Operation> {
        self.state().oplog.history(document_id, limit)
    }

    /// Copy the document's retained operations to the store.
    ///
    /// The in-memory log is untouched whatever the store does.
    pub async fn flush(&self, document_id: &str) -> Result<usize, StoreError> {
        let operations = self.state().oplog.entries_for(document_id);
        if operations.is_empty() {
            return Ok(0);
        }

        match self.store.persist_operations(document_id, operations).await {
            Ok(count) => {
                info!("Persisted {} operations for document {}", count, document_id);
                Ok(count)
            }
            Err(e) => {
                error!("Failed to persist operations for document {}: {}", document_id, e);
                Err(e)
            }
        }
    }

    /// Read operations back from the store, oldest first.
    pub async fn restore(&self, document_id: &str, limit: usize) -> Result<Vec<Operation>, StoreError> {
        match self.store.load_operations(document_id, limit).await {
            Ok(operations) => {
                info!("Restored {} operations for document {}", operations.len(), document_id);
                Ok(operations)
            }
            Err(e) => {
                error!("Failed to restore operations for document {}: {}", document_id, e);
                Err(e)
            }
        }
    }

    pub fn add_mention(
        &self,
        to_user_id: &str,
        from_user_id: &str,
        document_id: &str,
        context: Value,
    ) -> Mention {
        let mention = self
            .state()
            .mentions
            .add(to_user_id, from_user_id, document_id, context, Utc::now());
        self.emit(CollabEvent::MentionCreated {
            to_user_id: to_user_id.to_string(),
            mention: mention.clone(),
        });
        mention
    }

    pub fn mentions(&self, user_id: &str, unread_only: bool) -> Vec<Mention> {
        self.state().mentions.mentions(user_id, unread_only)
    }

    pub fn mark_mention_read(&self, mention_id: &str, user_id: &str) -> bool {
        self.state().mentions.mark_read(mention_id, user_id)
    }

    pub fn purge_mentions_older_than(&self, days: u32) -> usize {
        self.state().mentions.purge_older_than(days, Utc::now())
    }

    pub fn session_info(&self, document_id: &str) -> SessionInfo {
        let state = self.state();
        SessionInfo {
            document_id: document_id.to_string(),
            active_users: state.sessions.active_users(document_id),
            locked_sections: state
                .locks
                .for_document(document_id)
                .into_iter()
                .map(|(section_id, lock)| LockedSection {
                    section_id,
                    locked_by: lock.user_id,
                    since: lock.acquired_at,
                })
                .collect(),
        }
    }

    pub fn stats(&self) -> CollabStats {
        let state = self.state();
        CollabStats {
            documents: state.sessions.document_count(),
            locks: state.locks.len(),
            operations: state.oplog.len(),
            mentions: state.mentions.len(),
        }
    }

    /// Periodically drop mentions older than `retention_days`.
    pub fn spawn_mention_sweeper(self: Arc<Self>, retention_days: u32, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = self.purge_mentions_older_than(retention_days);
                if removed > 0 {
                    info!("Purged {} mentions older than {} days", removed, retention_days);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryOperationStore;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    struct UnreachableStore;

    #[async_trait]
    impl OperationStore for UnreachableStore {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        async fn persist_operations(&self, _: &str, _: Vec<Operation>) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn load_operations(&self, _: &str, _: usize) -> Result<Vec<Operation>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn service() -> CollabService {
        CollabService::new(CollabSettings::default(), Arc::new(MemoryOperationStore::new()))
    }

    fn change(document_id: &str, n: u64) -> NewOperation {
        NewOperation {
            document_id: document_id.to_string(),
            section_id: Some("intro".to_string()),
            user_id: "alice".to_string(),
            op_type: "content-change".to_string(),
            data: json!({ "n": n }),
        }
    }

    #[test]
    fn two_editors_take_turns_on_a_section() {
        let collab = service();
        collab.start_session("doc1", "alice");
        collab.start_session("doc1", "bob");

        let mut users = collab.session_info("doc1").active_users;
        users.sort();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);

        assert!(collab.acquire_lock("intro", "alice", "doc1").is_acquired());
        match collab.acquire_lock("intro", "bob", "doc1") {
            LockOutcome::Held { locked_by, .. } => assert_eq!(locked_by, "alice"),
            other => panic!("expected Held, got {:?}", other),
        }

        assert!(collab.release_lock("intro", "alice").is_some());
        assert!(collab.acquire_lock("intro", "bob", "doc1").is_acquired());

        let info = collab.session_info("doc1");
        assert_eq!(info.locked_sections.len(), 1);
        assert_eq!(info.locked_sections[0].locked_by, "bob");
    }

    #[test]
    fn stale_lock_can_be_taken_over() {
        let collab = service();
        let now = Utc::now();
        collab.acquire_lock_at("s1", "alice", "d1", now - ChronoDuration::seconds(31));
        assert!(collab.acquire_lock_at("s1", "bob", "d1", now).is_acquired());
        assert_eq!(collab.session_info("d1").locked_sections[0].locked_by, "bob");
    }

    #[test]
    fn foreign_release_is_a_no_op() {
        let collab = service();
        collab.acquire_lock("s1", "alice", "d1");
        assert!(collab.release_lock("s1", "bob").is_none());
        assert_eq!(collab.session_info("d1").locked_sections[0].locked_by, "alice");
    }

    #[test]
    fn ending_session_releases_all_locks() {
        let collab = service();
        collab.start_session("d1", "alice");
        collab.acquire_lock("s1", "alice", "d1");
        collab.acquire_lock("s2", "alice", "d1");

        let remaining = collab.end_session("d1", "alice");
        assert!(remaining.is_empty());

        let info = collab.session_info("d1");
        assert!(info.active_users.is_empty());
        assert!(info.locked_sections.is_empty());
        assert_eq!(collab.stats().documents, 0);
    }

    #[test]
    fn ending_presence_keeps_locks_elsewhere() {
        let collab = service();
        collab.start_session("d1", "alice");
        collab.start_session("d2", "alice");
        collab.acquire_lock("s9", "alice", "d2");

        assert!(collab.end_presence("d1", "alice").is_empty());
        assert!(collab.active_users("d1").is_empty());
        assert_eq!(collab.session_info("d2").locked_sections[0].locked_by, "alice");
    }

    #[test]
    fn release_all_reports_count() {
        let collab = service();
        collab.acquire_lock("s1", "alice", "d1");
        collab.acquire_lock("s2", "alice", "d1");
        collab.acquire_lock("s3", "bob", "d1");
        assert_eq!(collab.release_all_for("alice"), 2);
        assert_eq!(collab.release_all_for("alice"), 0);
        assert_eq!(collab.stats().locks, 1);
    }

    #[test]
    fn events_describe_bulk_unlocks() {
        let collab = service();
        let mut events = collab.subscribe();
        collab.start_session("d1", "alice");
        collab.acquire_lock("s1", "alice", "d1");
        collab.end_session("d1", "alice");

        let names: Vec<&'static str> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| {
                if let CollabEvent::SectionUnlocked { automatic, .. } = &event {
                    assert!(*automatic);
                }
                event.name()
            })
            .collect();
        assert_eq!(
            names,
            vec!["session-started", "section-locked", "section-unlocked", "session-ended"]
        );
    }

    #[test]
    fn end_session_on_unknown_document_is_quiet() {
        let collab = service();
        let mut events = collab.subscribe();
        assert!(collab.end_session("ghost", "alice").is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn history_and_restore_use_opposite_orders() {
        let collab = service();
        for n in 1..=3 {
            collab.log_operation(change("d1", n));
        }

        assert_eq!(collab.flush("d1").await.unwrap(), 3);

        let history: Vec<u64> = collab.history("d1", 10).iter().map(|o| o.id).collect();
        let restored: Vec<u64> = collab
            .restore("d1", 10)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();

        assert_eq!(history, vec![3, 2, 1]);
        assert_eq!(restored, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn flush_of_empty_document_writes_nothing() {
        let collab = service();
        assert_eq!(collab.flush("empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_failure_leaves_log_intact() {
        let collab = CollabService::new(CollabSettings::default(), Arc::new(UnreachableStore));
        collab.log_operation(change("d1", 1));

        let err = collab.flush("d1").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(collab.restore("d1", 10).await.is_err());

        collab.log_operation(change("d1", 2));
        assert_eq!(collab.history("d1", 10).len(), 2);
    }

    #[test]
    fn mentions_round_trip_through_service() {
        let collab = service();
        let mut events = collab.subscribe();
        let mention = collab.add_mention("alice", "bob", "d1", json!({ "section": "intro" }));

        assert!(!collab.mark_mention_read(&mention.id, "bob"));
        assert_eq!(collab.mentions("alice", true).len(), 1);
        assert!(collab.mark_mention_read(&mention.id, "alice"));
        assert!(collab.mentions("alice", true).is_empty());
        assert_eq!(collab.purge_mentions_older_than(30), 0);

        match events.try_recv() {
            Ok(CollabEvent::MentionCreated { to_user_id, .. }) => assert_eq!(to_user_id, "alice"),
            other => panic!("expected MentionCreated, got {:?}", other),
        }
    }

    #[test]
    fn log_is_bounded_by_settings() {
        let settings = CollabSettings {
            op_log_capacity: 2,
            ..CollabSettings::default()
        };
        let collab = CollabService::new(settings, Arc::new(MemoryOperationStore::new()));
        for n in 1..=3 {
            collab.log_operation(change("d1", n));
        }
        let ids: Vec<u64> = collab.history("d1", 10).iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }
}
