use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{Feedback, NewFeedback};
use crate::database::store::{FeedbackStore, StoreError};

/// In-process store for local development and tests.
///
/// `rejecting` builds a store that refuses any row whose content matches the
/// given value, which is how persistence failures are exercised without a
/// database.
#[derive(Default)]
pub struct MemoryFeedbackStore {
    records: RwLock<Vec<Feedback>>,
    reject_content: Option<String>,
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(content: impl Into<String>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            reject_content: Some(content.into()),
        }
    }

    pub async fn records(&self) -> Vec<Feedback> {
        self.records.read().await.clone()
    }

    pub async fn records_for(&self, user_id: &str) -> Vec<Feedback> {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }

    fn check(&self, row: &NewFeedback) -> Result<(), StoreError> {
        match &self.reject_content {
            Some(rejected) if *rejected == row.content => Err(StoreError::Rejected {
                line: row.line,
                reason: format!("content '{}' is not accepted", row.content),
            }),
            _ => Ok(()),
        }
    }

    fn materialize(user_id: &str, row: &NewFeedback) -> Feedback {
        Feedback {
            id: Uuid::new_v4(),
            content: row.content.clone(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn insert_batch(&self, user_id: &str, rows: &[NewFeedback]) -> Result<Vec<Feedback>, StoreError> {
        // Validate everything before touching the vector so a failure stores nothing
        for row in rows {
            self.check(row)?;
        }

        let created: Vec<Feedback> = rows.iter().map(|row| Self::materialize(user_id, row)).collect();
        self.records.write().await.extend(created.iter().cloned());
        Ok(created)
    }

    async fn insert_one(&self, user_id: &str, row: &NewFeedback) -> Result<Feedback, StoreError> {
        self.check(row)?;

        let created = Self::materialize(user_id, row);
        self.records.write().await.push(created.clone());
        Ok(created)
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, StoreError> {
        let count = self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.user_id == user_id)
            .count();
        Ok(count as i64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
