use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted feedback entry. `user_id` always comes from the session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub content: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// One decoded CSV row waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedback {
    pub content: String,
    /// 1-based line in the uploaded file the row started on.
    pub line: u64,
}

impl NewFeedback {
    pub fn new(content: impl Into<String>, line: u64) -> Self {
        Self {
            content: content.into(),
            line,
        }
    }
}
