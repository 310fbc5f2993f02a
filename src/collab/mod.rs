//! In-memory collaboration core: who is on a document, which sections are
//! locked, what was edited, and who was mentioned.
//!
//! State is process-local and lost on restart. Only the operation log has a
//! durable sink, see [`crate::db::OperationStore`].

pub mod events;
pub mod locks;
pub mod mentions;
pub mod oplog;
pub mod registry;
pub mod service;

pub use events::CollabEvent;
pub use locks::LockOutcome;
pub use mentions::Mention;
pub use oplog::{NewOperation, Operation};
pub use service::{CollabService, CollabSettings, LockedSection, SessionInfo};
