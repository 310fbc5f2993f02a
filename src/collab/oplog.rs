use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use utoipa::ToSchema;

/// One entry of the editing log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Sequence number, increasing for the lifetime of the process
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub document_id: String,
    pub section_id: Option<String>,
    pub user_id: String,
    #[serde(rename = "type")]
    pub op_type: String,
    /// Opaque payload, stored and forwarded as-is
    #[schema(value_type = Object)]
    pub data: Value,
}

/// Fields supplied by the caller when logging an operation.
#[derive(Debug, Clone)]
pub struct NewOperation {
    pub document_id: String,
    pub section_id: Option<String>,
    pub user_id: String,
    pub op_type: String,
    pub data: Value,
}

/// Bounded FIFO of operations across all documents.
#[derive(Debug)]
pub struct OperationLog {
    entries: VecDeque<Operation>,
    capacity: usize,
    next_id: u64,
}

impl OperationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            next_id: 1,
        }
    }

    pub fn append(&mut self, op: NewOperation, now: DateTime<Utc>) -> Operation {
        let entry = Operation {
            id: self.next_id,
            timestamp: now,
            document_id: op.document_id,
            section_id: op.section_id,
            user_id: op.user_id,
            op_type: op.op_type,
            data: op.data,
        };
        self.next_id += 1;

        self.entries.push_back(entry.clone());
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        entry
    }

    /// Most recent first, limited to `limit` entries of `document_id`.
    pub fn history(&self, document_id: &str, limit: usize) -> Vec<Operation> {
        self.entries
            .iter()
            .rev()
            .filter(|op| op.document_id == document_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Every retained entry of `document_id`, oldest first.
    pub fn entries_for(&self, document_id: &str) -> Vec<Operation> {
        self.entries
            .iter()
            .filter(|op| op.document_id == document_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
