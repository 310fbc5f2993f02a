pub mod dbcollab;
pub mod memstore;

use async_trait::async_trait;
use thiserror::Error;

use crate::collab::Operation;

pub use dbcollab::DbCollab;
pub use memstore::MemoryOperationStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("operation store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable sink for the operation log.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Short name used in logs and readiness output
    fn name(&self) -> &'static str;

    /// Append `operations` for `document_id`. Repeated calls append again.
    async fn persist_operations(
        &self,
        document_id: &str,
        operations: Vec<Operation>,
    ) -> Result<usize, StoreError>;

    /// The latest `limit` operations of `document_id`, oldest first.
    async fn load_operations(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<Operation>, StoreError>;
}
