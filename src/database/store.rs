use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{Feedback, NewFeedback};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row on line {line} rejected: {reason}")]
    Rejected { line: u64, reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::Sqlx(err))
    }
}

/// Persistence seam for feedback records.
///
/// Every write takes the owner explicitly; rows never carry their own user id.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Insert all rows atomically. Either every row is stored or none is.
    async fn insert_batch(&self, user_id: &str, rows: &[NewFeedback]) -> Result<Vec<Feedback>, StoreError>;

    /// Insert a single row on its own.
    async fn insert_one(&self, user_id: &str, row: &NewFeedback) -> Result<Feedback, StoreError>;

    async fn count_for_user(&self, user_id: &str) -> Result<i64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    /// How many independent inserts may be in flight at once.
    fn write_concurrency(&self) -> usize {
        DEFAULT_WRITE_CONCURRENCY
    }
}

pub const DEFAULT_WRITE_CONCURRENCY: usize = 16;

const INSERT_BATCH: &str = r#"
    INSERT INTO feedback (content, user_id)
    SELECT c, $2 FROM UNNEST($1::text[]) AS t(c)
    RETURNING id, content, user_id, created_at
"#;

const INSERT_ONE: &str = r#"
    INSERT INTO feedback (content, user_id)
    VALUES ($1, $2)
    RETURNING id, content, user_id, created_at
"#;

pub struct PgFeedbackStore {
    pool: PgPool,
    max_connections: u32,
}

impl PgFeedbackStore {
    /// `max_connections` must match the pool's size; it bounds concurrent inserts.
    pub fn new(pool: PgPool, max_connections: u32) -> Self {
        Self { pool, max_connections }
    }
}

#[async_trait]
impl FeedbackStore for PgFeedbackStore {
    async fn insert_batch(&self, user_id: &str, rows: &[NewFeedback]) -> Result<Vec<Feedback>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let contents: Vec<String> = rows.iter().map(|row| row.content.clone()).collect();

        // Rollback happens automatically when tx is dropped
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, Feedback>(INSERT_BATCH)
            .bind(&contents)
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(user_id = %user_id, count = created.len(), "Inserted feedback batch");
        Ok(created)
    }

    async fn insert_one(&self, user_id: &str, row: &NewFeedback) -> Result<Feedback, StoreError> {
        let created = sqlx::query_as::<_, Feedback>(INSERT_ONE)
            .bind(&row.content)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feedback WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        DatabaseManager::health_check(&self.pool).await?;
        Ok(())
    }

    fn write_concurrency(&self) -> usize {
        (self.max_connections as usize).max(1)
    }
}
