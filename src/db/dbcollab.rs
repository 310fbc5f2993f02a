use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Error as SqlxError;
use std::time::Duration;
use tracing::{error, info};

use super::{OperationStore, StoreError};
use crate::collab::Operation;

/// Operation row from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OperationRow {
    pub seq: i64,
    pub document_id: String,
    pub section_id: Option<String>,
    pub user_id: String,
    pub operation_type: String,
    pub data: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<OperationRow> for Operation {
    fn from(row: OperationRow) -> Self {
        Operation {
            id: u64::try_from(row.seq).unwrap_or_default(),
            timestamp: row.created_at,
            document_id: row.document_id,
            section_id: row.section_id,
            user_id: row.user_id,
            op_type: row.operation_type,
            data: row.data.0,
        }
    }
}

/// Postgres-backed operation store
pub struct DbCollab {
    pool: PgPool,
}

impl DbCollab {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    /// Create the operations table and its index if they are missing
    pub async fn ensure_schema(&self) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collaboration_operations (
                id BIGSERIAL PRIMARY KEY,
                seq BIGINT NOT NULL,
                document_id TEXT NOT NULL,
                section_id TEXT,
                user_id TEXT NOT NULL,
                operation_type TEXT NOT NULL,
                data JSONB NOT NULL DEFAULT 'null'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_collaboration_operations_document
            ON collaboration_operations (document_id, created_at)
        "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Table collaboration_operations is ready");
        Ok(())
    }

    /// Insert a batch of operations in one transaction
    ///
    /// # Returns
    /// * `Result<usize, SqlxError>` - Number of rows written
    pub async fn insert_operations(
        &self,
        document_id: &str,
        operations: &[Operation],
    ) -> Result<usize, SqlxError> {
        let pool_idle = self.pool.num_idle() as u32;
        let pool_size = self.pool.size();
        info!(
            "Persisting {} operations for document {}. Pool connections: {} idle, {} in use",
            operations.len(),
            document_id,
            pool_idle,
            pool_size.saturating_sub(pool_idle)
        );

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    "Failed to acquire connection from pool for document {}: {}. Pool state: {} idle, {} total",
                    document_id,
                    e,
                    self.pool.num_idle(),
                    self.pool.size()
                );
                return Err(e);
            }
        };

        let query_sql = r#"
            INSERT INTO collaboration_operations
                (seq, document_id, section_id, user_id, operation_type, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#;

        for op in operations {
            sqlx::query(query_sql)
                .bind(i64::try_from(op.id).unwrap_or(i64::MAX))
                .bind(document_id)
                .bind(op.section_id.as_deref())
                .bind(&op.user_id)
                .bind(&op.op_type)
                .bind(Json(op.data.clone()))
                .bind(op.timestamp)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(operations.len())
    }

    /// Load the most recent `limit` operations of a document, oldest first
    pub async fn select_operations(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<Operation>, SqlxError> {
        let query_sql = r#"
            SELECT seq, document_id, section_id, user_id, operation_type, data, created_at
            FROM collaboration_operations
            WHERE document_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
        "#;

        let rows = sqlx::query_as::<_, OperationRow>(query_sql)
            .bind(document_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let mut operations: Vec<Operation> = rows.into_iter().map(Operation::from).collect();
        operations.reverse();
        Ok(operations)
    }
}

#[async_trait]
impl OperationStore for DbCollab {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn persist_operations(
        &self,
        document_id: &str,
        operations: Vec<Operation>,
    ) -> Result<usize, StoreError> {
        Ok(self.insert_operations(document_id, &operations).await?)
    }

    async fn load_operations(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<Operation>, StoreError> {
        Ok(self.select_operations(document_id, limit).await?)
    }
}
