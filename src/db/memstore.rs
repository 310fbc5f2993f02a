use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{OperationStore, StoreError};
use crate::collab::Operation;

/// Process-local operation store, used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryOperationStore {
    rows: Mutex<HashMap<String, Vec<Operation>>>,
}

impl MemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self, document_id: &str) -> usize {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        rows.get(document_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl OperationStore for MemoryOperationStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn persist_operations(
        &self,
        document_id: &str,
        operations: Vec<Operation>,
    ) -> Result<usize, StoreError> {
        let count = operations.len();
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        rows.entry(document_id.to_string())
            .or_default()
            .extend(operations);
        Ok(count)
    }

    async fn load_operations(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<Operation>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = rows.get(document_id).map(Vec::as_slice).unwrap_or_default();
        let start = stored.len().saturating_sub(limit);
        Ok(stored[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn op(id: u64) -> Operation {
        Operation {
            id,
            timestamp: Utc::now(),
            document_id: "d1".to_string(),
            section_id: None,
            user_id: "alice".to_string(),
            op_type: "content-change".to_string(),
            data: json!(id),
        }
    }

    #[tokio::test]
    async fn load_returns_latest_oldest_first() {
        let store = MemoryOperationStore::new();
        store
            .persist_operations("d1", vec![op(1), op(2), op(3)])
            .await
            .unwrap();

        let loaded = store.load_operations("d1", 2).await.unwrap();
        let ids: Vec<u64> = loaded.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(store.load_operations("d2", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persisting_twice_appends() {
        let store = MemoryOperationStore::new();
        store.persist_operations("d1", vec![op(1)]).await.unwrap();
        store.persist_operations("d1", vec![op(1)]).await.unwrap();
        assert_eq!(store.row_count("d1"), 2);
    }
}
