use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};

use super::error::{IngestError, RowFailure};
use crate::config::PersistMode;
use crate::database::models::{Feedback, NewFeedback};
use crate::database::store::{FeedbackStore, StoreError};

/// Write decoded rows for `user_id` using the configured failure policy.
/// Returns the number of stored rows.
pub async fn persist_rows(
    store: &dyn FeedbackStore,
    user_id: &str,
    rows: &[NewFeedback],
    mode: PersistMode,
) -> Result<usize, IngestError> {
    match mode {
        PersistMode::Transactional => persist_transactional(store, user_id, rows).await,
        PersistMode::BestEffort => persist_best_effort(store, user_id, rows).await,
    }
}

async fn persist_transactional(
    store: &dyn FeedbackStore,
    user_id: &str,
    rows: &[NewFeedback],
) -> Result<usize, IngestError> {
    match store.insert_batch(user_id, rows).await {
        Ok(created) => Ok(created.len()),
        Err(e) => {
            tracing::error!(user_id = %user_id, rows = rows.len(), "Feedback batch rolled back: {}", e);
            let failures = match e {
                StoreError::Rejected { line, reason } => vec![RowFailure { line, reason }],
                StoreError::Database(_) => Vec::new(),
            };
            Err(IngestError::Persistence {
                persisted: 0,
                failures,
            })
        }
    }
}

async fn persist_best_effort(
    store: &dyn FeedbackStore,
    user_id: &str,
    rows: &[NewFeedback],
) -> Result<usize, IngestError> {
    // Bounded by the store so rows don't fail waiting for a connection
    let limit = store.write_concurrency().max(1);
    // Futures are built up front (they stay unstarted until polled) so no
    // closure is held across the await; works around rustc's higher-ranked
    // `Send` inference (rust#64552)
    let inserts: Vec<BoxFuture<'_, (u64, Result<Feedback, StoreError>)>> = rows
        .iter()
        .map(|row| -> BoxFuture<'_, (u64, Result<Feedback, StoreError>)> {
            Box::pin(async move { (row.line, store.insert_one(user_id, row).await) })
        })
        .collect();
    let outcomes: Vec<_> = stream::iter(inserts)
        .buffer_unordered(limit)
        .collect()
        .await;

    let mut persisted = 0;
    let mut failures = Vec::new();

    for (line, outcome) in outcomes {
        match outcome {
            Ok(_) => persisted += 1,
            Err(e) => {
                tracing::error!(user_id = %user_id, line = line, "Feedback row insert failed: {}", e);
                failures.push(RowFailure {
                    line,
                    reason: client_reason(&e),
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(persisted)
    } else {
        Err(IngestError::Persistence { persisted, failures })
    }
}

// SQL details stay in the logs
fn client_reason(err: &StoreError) -> String {
    match err {
        StoreError::Rejected { reason, .. } => reason.clone(),
        StoreError::Database(_) => "database error".to_string(),
    }
}
