//! Upload ingestion: stage the uploaded file, decode its rows, persist them
//! for the authenticated caller.
//!
//! One call handles one request and never retries. Stages run in order
//! (validating, decoding, persisting) and the first failure ends the run.
//! The staged temporary file lives exactly as long as the run.

pub mod decode;
pub mod error;
pub mod persist;
pub mod staging;

use axum::extract::Multipart;

pub use decode::{decode_rows, FeedbackRows, CONTENT_COLUMN};
pub use error::{IngestError, RowFailure};
pub use persist::persist_rows;
pub use staging::{is_csv_media_type, stage_upload, StagedUpload};

use crate::auth::SessionUser;
use crate::config::UploadConfig;
use crate::database::FeedbackStore;

/// Run the whole pipeline under the configured processing timeout.
pub async fn ingest_upload(
    multipart: &mut Multipart,
    user: &SessionUser,
    store: &dyn FeedbackStore,
    config: &UploadConfig,
) -> Result<usize, IngestError> {
    let budget = config.timeout();

    let outcome = match tokio::time::timeout(budget, run(multipart, user, store, config)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(IngestError::Timeout(budget)),
    };

    match &outcome {
        Ok(count) => tracing::info!(user_id = %user.id, rows = count, "Upload succeeded"),
        Err(e) => tracing::warn!(user_id = %user.id, kind = e.kind(), "Upload failed: {}", e),
    }

    outcome
}

async fn run(
    multipart: &mut Multipart,
    user: &SessionUser,
    store: &dyn FeedbackStore,
    config: &UploadConfig,
) -> Result<usize, IngestError> {
    tracing::debug!(user_id = %user.id, "Validating upload");
    let staged = stage_upload(multipart, config).await?;

    tracing::debug!(
        user_id = %user.id,
        size = staged.size,
        file_name = ?staged.file_name,
        "Decoding upload"
    );
    let reader = staged.reopen()?;
    let rows = tokio::task::spawn_blocking(move || decode_rows(reader))
        .await
        .map_err(|e| IngestError::Internal(format!("decode task failed: {}", e)))??;

    tracing::debug!(user_id = %user.id, rows = rows.len(), mode = ?config.persist_mode, "Persisting upload");
    let persisted = persist_rows(store, &user.id, &rows, config.persist_mode).await?;

    drop(staged);
    Ok(persisted)
}
