use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collab::{CollabEvent, CollabService};
use crate::models::{ClientMessage, ServerMessage};

use super::msg_edit_handler::{
    handle_comment_thread_message, handle_content_change_message, handle_cursor_move_message,
};
use super::msg_lock_handler::{handle_lock_request_message, handle_unlock_request_message};
use super::msg_mention_handler::handle_mention_message;
use super::msg_ping_handler::handle_ping_message;
use super::msg_session_handler::{handle_join_message, handle_leave_message};

struct Connection {
    outbox: mpsc::UnboundedSender<ServerMessage>,
    /// User bound by the first successful join
    user_id: Option<String>,
    /// User proven by the auth token at upgrade time
    authenticated_user: Option<String>,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct Routing {
    connections: HashMap<String, Connection>,
    user_connections: HashMap<String, HashSet<String>>,
    rooms: HashMap<String, HashSet<String>>,
}

/// What is left to do after a connection went away.
#[derive(Debug)]
pub struct Departure {
    pub user_id: Option<String>,
    pub rooms: Vec<String>,
    /// The user has no other open connection
    pub last_connection: bool,
}

/// Routes socket traffic to the collaboration service and fans results out.
///
/// The hub never touches session, lock, log or mention state itself; it only
/// keeps its own connection and room tables.
pub struct Hub {
    service: Arc<CollabService>,
    routing: Mutex<Routing>,
}

impl Hub {
    pub fn new(service: Arc<CollabService>) -> Self {
        Self {
            service,
            routing: Mutex::new(Routing::default()),
        }
    }

    pub fn service(&self) -> &CollabService {
        &self.service
    }

    fn routing(&self) -> MutexGuard<'_, Routing> {
        self.routing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new connection and return its id and outbound queue.
    pub fn register_connection(
        &self,
        authenticated_user: Option<String>,
    ) -> (String, mpsc::UnboundedReceiver<ServerMessage>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4().to_string();
        self.routing().connections.insert(
            connection_id.clone(),
            Connection {
                outbox,
                user_id: None,
                authenticated_user,
                rooms: HashSet::new(),
            },
        );
        debug!("Registered connection {}", connection_id);
        (connection_id, inbox)
    }

    /// Associate the connection with `user_id`.
    pub fn bind_user(&self, connection_id: &str, user_id: &str) -> Result<(), String> {
        let mut routing = self.routing();
        let conn = routing
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| "Unknown connection".to_string())?;

        if let Some(authenticated) = &conn.authenticated_user {
            if authenticated != user_id {
                return Err(format!("Connection is authenticated as a different user than '{}'", user_id));
            }
        }
        if let Some(bound) = &conn.user_id {
            if bound != user_id {
                return Err(format!("Connection is already bound to user '{}'", bound));
            }
            return Ok(());
        }
        conn.user_id = Some(user_id.to_string());

        routing
            .user_connections
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
        Ok(())
    }

    pub fn resolve_user(&self, connection_id: &str) -> Option<String> {
        self.routing()
            .connections
            .get(connection_id)
            .and_then(|conn| conn.user_id.clone())
    }

    pub fn join_room(&self, connection_id: &str, document_id: &str) {
        let mut routing = self.routing();
        let Some(conn) = routing.connections.get_mut(connection_id) else {
            return;
        };
        conn.rooms.insert(document_id.to_string());
        routing
            .rooms
            .entry(document_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    pub fn leave_room(&self, connection_id: &str, document_id: &str) -> bool {
        let mut routing = self.routing();
        if let Some(conn) = routing.connections.get_mut(connection_id) {
            conn.rooms.remove(document_id);
        }
        Self::remove_from_room(&mut routing, connection_id, document_id)
    }

    fn remove_from_room(routing: &mut Routing, connection_id: &str, document_id: &str) -> bool {
        let Some(members) = routing.rooms.get_mut(document_id) else {
            return false;
        };
        let removed = members.remove(connection_id);
        if members.is_empty() {
            routing.rooms.remove(document_id);
        }
        removed
    }

    /// Whether any connection of `user_id` is still in the document room.
    pub fn user_in_room(&self, user_id: &str, document_id: &str) -> bool {
        let routing = self.routing();
        routing.user_connections.get(user_id).is_some_and(|conns| {
            conns.iter().any(|conn_id| {
                routing
                    .connections
                    .get(conn_id)
                    .is_some_and(|conn| conn.rooms.contains(document_id))
            })
        })
    }

    /// Forget a connection. Returns `None` when it was never registered.
    pub fn remove_connection(&self, connection_id: &str) -> Option<Departure> {
        let mut routing = self.routing();
        let conn = routing.connections.remove(connection_id)?;

        let mut rooms: Vec<String> = conn.rooms.into_iter().collect();
        rooms.sort();
        for document_id in &rooms {
            Self::remove_from_room(&mut routing, connection_id, document_id);
        }

        let mut last_connection = false;
        if let Some(user_id) = &conn.user_id {
            if let Some(conns) = routing.user_connections.get_mut(user_id) {
                conns.remove(connection_id);
                if conns.is_empty() {
                    routing.user_connections.remove(user_id);
                    last_connection = true;
                }
            }
        }

        Some(Departure {
            user_id: conn.user_id,
            rooms,
            last_connection,
        })
    }

    pub fn send_to(&self, connection_id: &str, msg: ServerMessage) -> bool {
        match self.routing().connections.get(connection_id) {
            Some(conn) => conn.outbox.send(msg).is_ok(),
            None => false,
        }
    }

    pub fn send_error(&self, connection_id: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("Rejecting message from connection {}: {}", connection_id, message);
        self.send_to(connection_id, ServerMessage::error(message));
    }

    /// Send to every connection in the document room except `except`.
    pub fn broadcast_to_room(&self, document_id: &str, msg: ServerMessage, except: Option<&str>) -> usize {
        let routing = self.routing();
        let Some(members) = routing.rooms.get(document_id) else {
            return 0;
        };
        members
            .iter()
            .filter(|conn_id| Some(conn_id.as_str()) != except)
            .filter_map(|conn_id| routing.connections.get(conn_id))
            .filter(|conn| conn.outbox.send(msg.clone()).is_ok())
            .count()
    }

    /// Send to every connection of a user.
    pub fn send_to_user(&self, user_id: &str, msg: ServerMessage) -> usize {
        let routing = self.routing();
        let Some(conns) = routing.user_connections.get(user_id) else {
            return 0;
        };
        conns
            .iter()
            .filter_map(|conn_id| routing.connections.get(conn_id))
            .filter(|conn| conn.outbox.send(msg.clone()).is_ok())
            .count()
    }

    pub fn connection_count(&self) -> usize {
        self.routing().connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.routing().rooms.len()
    }

    pub fn user_count(&self) -> usize {
        self.routing().user_connections.len()
    }

    pub async fn dispatch(&self, connection_id: &str, msg: ClientMessage) {
        match msg {
            ClientMessage::Join(join) => handle_join_message(self, connection_id, join),
            ClientMessage::Leave(leave) => handle_leave_message(self, connection_id, leave).await,
            ClientMessage::ContentChange(change) => {
                handle_content_change_message(self, connection_id, change)
            }
            ClientMessage::LockRequest(req) => handle_lock_request_message(self, connection_id, req),
            ClientMessage::UnlockRequest(req) => {
                handle_unlock_request_message(self, connection_id, req)
            }
            ClientMessage::CursorMove(cursor) => {
                handle_cursor_move_message(self, connection_id, cursor)
            }
            ClientMessage::Mention(mention) => handle_mention_message(self, connection_id, mention),
            ClientMessage::CommentThread(thread) => {
                handle_comment_thread_message(self, connection_id, thread)
            }
            ClientMessage::Ping => handle_ping_message(self, connection_id),
        }
    }

    /// Relay service events that no message handler answers for itself.
    ///
    /// Bulk lock releases happen on session end and disconnect, so the rooms
    /// are told here that those sections are free again.
    pub fn spawn_event_forwarder(self: Arc<Self>) -> JoinHandle<()> {
        let mut events = self.service.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(CollabEvent::SectionUnlocked {
                        document_id,
                        section_id,
                        automatic: true,
                        timestamp,
                        ..
                    }) => {
                        self.broadcast_to_room(
                            &document_id,
                            ServerMessage::SectionLockUpdated {
                                section_id,
                                locked_by: None,
                                timestamp,
                            },
                            None,
                        );
                    }
                    Ok(event) => {
                        debug!("Collaboration event {} on document {}", event.name(), event.document_id());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Event forwarder lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => {
                        info!("Collaboration event channel closed");
                        break;
                    }
                }
            }
        })
    }
}

/// Treat absent and empty strings alike.
pub(super) fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::collab::CollabSettings;
    use crate::db::MemoryOperationStore;
    use serde_json::json;
    use tokio::time::{timeout, Duration};

    pub(crate) fn hub() -> Arc<Hub> {
        let service = CollabService::new(CollabSettings::default(), Arc::new(MemoryOperationStore::new()));
        Arc::new(Hub::new(Arc::new(service)))
    }

    pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn parse(raw: serde_json::Value) -> ClientMessage {
        serde_json::from_value(raw).unwrap()
    }

    async fn join(hub: &Hub, conn: &str, document_id: &str, user_id: &str) {
        hub.dispatch(
            conn,
            parse(json!({ "type": "join", "documentId": document_id, "userId": user_id, "userName": user_id })),
        )
        .await;
    }

    #[tokio::test]
    async fn join_informs_joiner_and_room() {
        let hub = hub();
        let (alice, mut alice_rx) = hub.register_connection(None);
        let (bob, mut bob_rx) = hub.register_connection(None);

        join(&hub, &alice, "doc1", "alice").await;
        drain(&mut alice_rx);
        join(&hub, &bob, "doc1", "bob").await;

        match drain(&mut bob_rx).as_slice() {
            [ServerMessage::SessionInfo { active_users, session_id, .. }] => {
                assert_eq!(active_users, &vec!["alice".to_string(), "bob".to_string()]);
                assert_eq!(session_id, &bob);
            }
            other => panic!("unexpected {:?}", other),
        }
        match drain(&mut alice_rx).as_slice() {
            [ServerMessage::UserJoined { user_id, user_name, .. }] => {
                assert_eq!(user_id, "bob");
                assert_eq!(user_name.as_deref(), Some("bob"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn join_without_ids_is_rejected() {
        let hub = hub();
        let (conn, mut rx) = hub.register_connection(None);
        hub.dispatch(&conn, parse(json!({ "type": "join", "documentId": "doc1" }))).await;

        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Error { .. }]));
        assert!(hub.service().active_users("doc1").is_empty());
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn join_as_someone_else_is_rejected_when_authenticated() {
        let hub = hub();
        let (conn, mut rx) = hub.register_connection(Some("alice".to_string()));
        join(&hub, &conn, "doc1", "mallory").await;

        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Error { .. }]));
        assert!(hub.service().active_users("doc1").is_empty());
    }

    #[tokio::test]
    async fn content_change_skips_sender_and_acks() {
        let hub = hub();
        let (alice, mut alice_rx) = hub.register_connection(None);
        let (bob, mut bob_rx) = hub.register_connection(None);
        join(&hub, &alice, "doc1", "alice").await;
        join(&hub, &bob, "doc1", "bob").await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.dispatch(
            &alice,
            parse(json!({
                "type": "content-change",
                "documentId": "doc1",
                "sectionId": "intro",
                "change": { "insert": "hello", "at": 0 }
            })),
        )
        .await;

        let acked_id = match drain(&mut alice_rx).as_slice() {
            [ServerMessage::ChangeAcknowledged { operation_id, .. }] => *operation_id,
            other => panic!("unexpected {:?}", other),
        };
        match drain(&mut bob_rx).as_slice() {
            [ServerMessage::ContentChanged { user_id, change, operation_id, .. }] => {
                assert_eq!(user_id, "alice");
                assert_eq!(change, &json!({ "insert": "hello", "at": 0 }));
                assert_eq!(*operation_id, acked_id);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(hub.service().history("doc1", 10).len(), 1);
    }

    #[tokio::test]
    async fn content_change_requires_section() {
        let hub = hub();
        let (alice, mut rx) = hub.register_connection(None);
        join(&hub, &alice, "doc1", "alice").await;
        drain(&mut rx);

        hub.dispatch(&alice, parse(json!({ "type": "content-change", "documentId": "doc1" }))).await;
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Error { .. }]));
        assert!(hub.service().history("doc1", 10).is_empty());
    }

    #[tokio::test]
    async fn lock_conflict_goes_only_to_requester() {
        let hub = hub();
        let (alice, mut alice_rx) = hub.register_connection(None);
        let (bob, mut bob_rx) = hub.register_connection(None);
        join(&hub, &alice, "doc1", "alice").await;
        join(&hub, &bob, "doc1", "bob").await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let lock = json!({ "type": "lock-request", "documentId": "doc1", "sectionId": "intro" });
        hub.dispatch(&alice, parse(lock.clone())).await;
        assert!(matches!(drain(&mut alice_rx).as_slice(), [ServerMessage::SectionLocked { .. }]));
        match drain(&mut bob_rx).as_slice() {
            [ServerMessage::SectionLockUpdated { locked_by, .. }] => {
                assert_eq!(locked_by.as_deref(), Some("alice"))
            }
            other => panic!("unexpected {:?}", other),
        }

        hub.dispatch(&bob, parse(lock.clone())).await;
        match drain(&mut bob_rx).as_slice() {
            [ServerMessage::LockFailed { locked_by, .. }] => assert_eq!(locked_by, "alice"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(drain(&mut alice_rx).is_empty());

        let unlock = json!({ "type": "unlock-request", "documentId": "doc1", "sectionId": "intro" });
        hub.dispatch(&alice, parse(unlock)).await;
        match drain(&mut alice_rx).as_slice() {
            [ServerMessage::SectionUnlocked { .. }, ServerMessage::SectionLockUpdated { locked_by: None, .. }] => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            drain(&mut bob_rx).as_slice(),
            [ServerMessage::SectionLockUpdated { locked_by: None, .. }]
        ));

        hub.dispatch(&bob, parse(lock)).await;
        assert!(matches!(drain(&mut bob_rx).as_slice(), [ServerMessage::SectionLocked { .. }]));
    }

    #[tokio::test]
    async fn lock_request_needs_a_joined_user() {
        let hub = hub();
        let (conn, mut rx) = hub.register_connection(None);
        hub.dispatch(
            &conn,
            parse(json!({ "type": "lock-request", "documentId": "doc1", "sectionId": "intro" })),
        )
        .await;
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Error { .. }]));
        assert!(hub.service().session_info("doc1").locked_sections.is_empty());
    }

    #[tokio::test]
    async fn cursor_moves_are_not_logged() {
        let hub = hub();
        let (alice, mut alice_rx) = hub.register_connection(None);
        let (bob, mut bob_rx) = hub.register_connection(None);
        join(&hub, &alice, "doc1", "alice").await;
        join(&hub, &bob, "doc1", "bob").await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.dispatch(
            &alice,
            parse(json!({ "type": "cursor-move", "documentId": "doc1", "sectionId": "intro", "position": 12 })),
        )
        .await;

        assert!(drain(&mut alice_rx).is_empty());
        match drain(&mut bob_rx).as_slice() {
            [ServerMessage::CursorPositionUpdated { user_id, position, .. }] => {
                assert_eq!(user_id, "alice");
                assert_eq!(position, &json!(12));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(hub.service().history("doc1", 10).is_empty());
    }

    #[tokio::test]
    async fn mention_reaches_every_device_of_recipient() {
        let hub = hub();
        let (bob, mut bob_rx) = hub.register_connection(None);
        let (alice_tab1, mut tab1_rx) = hub.register_connection(None);
        let (alice_tab2, mut tab2_rx) = hub.register_connection(None);
        join(&hub, &bob, "doc1", "bob").await;
        join(&hub, &alice_tab1, "doc1", "alice").await;
        join(&hub, &alice_tab2, "doc2", "alice").await;
        drain(&mut bob_rx);
        drain(&mut tab1_rx);
        drain(&mut tab2_rx);

        hub.dispatch(
            &bob,
            parse(json!({
                "type": "mention",
                "documentId": "doc1",
                "toUserId": "alice",
                "fromUserId": "bob",
                "fromName": "Bob",
                "context": "please review scope"
            })),
        )
        .await;

        for rx in [&mut tab1_rx, &mut tab2_rx] {
            match drain(rx).as_slice() {
                [ServerMessage::YouWereMentioned { by, mention, .. }] => {
                    assert_eq!(by.as_deref(), Some("Bob"));
                    assert_eq!(mention.from_user_id, "bob");
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(matches!(drain(&mut bob_rx).as_slice(), [ServerMessage::MentionSent { .. }]));
        assert_eq!(hub.service().mentions("alice", true).len(), 1);
    }

    #[tokio::test]
    async fn mention_on_behalf_of_someone_else_is_refused() {
        let hub = hub();
        let (mallory, mut rx) = hub.register_connection(None);
        join(&hub, &mallory, "doc1", "mallory").await;
        drain(&mut rx);

        hub.dispatch(
            &mallory,
            parse(json!({
                "type": "mention",
                "documentId": "doc1",
                "toUserId": "alice",
                "fromUserId": "bob",
                "context": null
            })),
        )
        .await;

        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Error { .. }]));
        assert!(hub.service().mentions("alice", false).is_empty());
    }

    #[tokio::test]
    async fn comment_thread_reaches_whole_room() {
        let hub = hub();
        let (alice, mut alice_rx) = hub.register_connection(None);
        let (bob, mut bob_rx) = hub.register_connection(None);
        join(&hub, &alice, "doc1", "alice").await;
        join(&hub, &bob, "doc1", "bob").await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.dispatch(
            &alice,
            parse(json!({
                "type": "comment-thread",
                "documentId": "doc1",
                "sectionId": "scope",
                "threadId": "t1",
                "action": "create",
                "commentData": { "text": "Is this in scope?" }
            })),
        )
        .await;

        match drain(&mut alice_rx).as_slice() {
            [ServerMessage::ThreadUpdated { .. }, ServerMessage::ThreadAcknowledged { thread_id, .. }] => {
                assert_eq!(thread_id, "t1")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(drain(&mut bob_rx).as_slice(), [ServerMessage::ThreadUpdated { .. }]));
        let logged = hub.service().history("doc1", 1);
        assert_eq!(logged[0].op_type, "comment-thread");
    }

    #[tokio::test]
    async fn leave_flushes_and_notifies_room() {
        let hub = hub();
        let (alice, mut alice_rx) = hub.register_connection(None);
        let (bob, mut bob_rx) = hub.register_connection(None);
        join(&hub, &alice, "doc1", "alice").await;
        join(&hub, &bob, "doc1", "bob").await;
        hub.dispatch(
            &alice,
            parse(json!({ "type": "content-change", "documentId": "doc1", "sectionId": "intro", "change": "x" })),
        )
        .await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.dispatch(&alice, parse(json!({ "type": "leave", "documentId": "doc1" }))).await;

        match drain(&mut bob_rx).as_slice() {
            [ServerMessage::UserLeft { user_id, active_users, .. }] => {
                assert_eq!(user_id, "alice");
                assert_eq!(active_users, &vec!["bob".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(hub.service().restore("doc1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_releases_locks_and_frees_sections() {
        let hub = hub();
        let forwarder = hub.clone().spawn_event_forwarder();
        let (alice, mut alice_rx) = hub.register_connection(None);
        let (bob, mut bob_rx) = hub.register_connection(None);
        join(&hub, &alice, "doc1", "alice").await;
        join(&hub, &bob, "doc1", "bob").await;
        for section in ["s1", "s2"] {
            hub.dispatch(
                &alice,
                parse(json!({ "type": "lock-request", "documentId": "doc1", "sectionId": section })),
            )
            .await;
        }
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        crate::websocket::msg_session_handler::handle_disconnect(&hub, &alice).await;

        let info = hub.service().session_info("doc1");
        assert_eq!(info.active_users, vec!["bob".to_string()]);
        assert!(info.locked_sections.is_empty());

        let mut freed = Vec::new();
        let mut saw_user_left = false;
        while freed.len() < 2 {
            match timeout(Duration::from_secs(1), bob_rx.recv()).await {
                Ok(Some(ServerMessage::SectionLockUpdated { section_id, locked_by: None, .. })) => {
                    freed.push(section_id)
                }
                Ok(Some(ServerMessage::UserLeft { .. })) => saw_user_left = true,
                Ok(Some(_)) => {}
                other => panic!("expected lock updates, got {:?}", other),
            }
        }
        freed.sort();
        assert_eq!(freed, vec!["s1".to_string(), "s2".to_string()]);
        assert!(saw_user_left);
        assert_eq!(hub.connection_count(), 1);
        forwarder.abort();
    }

    #[tokio::test]
    async fn second_tab_keeps_user_in_session() {
        let hub = hub();
        let (tab1, _tab1_rx) = hub.register_connection(None);
        let (tab2, _tab2_rx) = hub.register_connection(None);
        join(&hub, &tab1, "doc1", "alice").await;
        join(&hub, &tab2, "doc1", "alice").await;
        hub.dispatch(
            &tab1,
            parse(json!({ "type": "lock-request", "documentId": "doc1", "sectionId": "intro" })),
        )
        .await;

        crate::websocket::msg_session_handler::handle_disconnect(&hub, &tab1).await;

        let info = hub.service().session_info("doc1");
        assert_eq!(info.active_users, vec!["alice".to_string()]);
        assert_eq!(info.locked_sections.len(), 1);
        assert_eq!(hub.user_count(), 1);
    }

    #[tokio::test]
    async fn disconnect_of_unknown_or_anonymous_connection_is_harmless() {
        let hub = hub();
        crate::websocket::msg_session_handler::handle_disconnect(&hub, "never-registered").await;

        let (conn, _rx) = hub.register_connection(None);
        crate::websocket::msg_session_handler::handle_disconnect(&hub, &conn).await;
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let hub = hub();
        let (conn, mut rx) = hub.register_connection(None);
        hub.dispatch(&conn, ClientMessage::Ping).await;
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Pong { .. }]));
    }

    #[tokio::test]
    async fn closing_one_tab_keeps_locks_held_from_another_document() {
        let hub = hub();
        let (tab1, _tab1_rx) = hub.register_connection(None);
        let (tab2, mut tab2_rx) = hub.register_connection(None);
        join(&hub, &tab1, "doc1", "alice").await;
        join(&hub, &tab2, "doc2", "alice").await;
        hub.dispatch(
            &tab2,
            parse(json!({ "type": "lock-request", "documentId": "doc2", "sectionId": "s9" })),
        )
        .await;
        drain(&mut tab2_rx);

        crate::websocket::msg_session_handler::handle_disconnect(&hub, &tab1).await;

        assert!(hub.service().active_users("doc1").is_empty());
        let doc2 = hub.service().session_info("doc2");
        assert_eq!(doc2.active_users, vec!["alice".to_string()]);
        assert_eq!(doc2.locked_sections.len(), 1);
        assert_eq!(doc2.locked_sections[0].locked_by, "alice");

        crate::websocket::msg_session_handler::handle_disconnect(&hub, &tab2).await;
        assert!(hub.service().session_info("doc2").locked_sections.is_empty());
    }

    #[tokio::test]
    async fn locking_requires_membership_of_the_document() {
        let hub = hub();
        let (alice, mut rx) = hub.register_connection(None);
        join(&hub, &alice, "doc1", "alice").await;
        drain(&mut rx);

        hub.dispatch(
            &alice,
            parse(json!({ "type": "lock-request", "documentId": "doc2", "sectionId": "s1" })),
        )
        .await;
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Error { .. }]));
        assert!(hub.service().session_info("doc2").locked_sections.is_empty());

        hub.dispatch(
            &alice,
            parse(json!({ "type": "unlock-request", "documentId": "doc2", "sectionId": "s1" })),
        )
        .await;
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Error { .. }]));
    }
}
