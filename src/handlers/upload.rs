use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::SessionUser;
use crate::error::ApiError;
use crate::ingest::ingest_upload;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Feedback uploaded successfully";

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadAck {
    pub message: String,
    pub count: usize,
}

/// POST /api/upload - Store every row of an uploaded CSV as feedback owned by the caller
///
/// Extractor order is the check order: the session is resolved before the
/// multipart body is opened.
pub async fn upload_feedback(
    State(state): State<AppState>,
    user: SessionUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadAck>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        ApiError::validation_error(format!(
            "Expected a multipart/form-data body: {}",
            rejection.body_text()
        ))
    })?;

    let count = ingest_upload(&mut multipart, &user, state.store.as_ref(), &state.config.upload).await?;

    Ok(Json(UploadAck {
        message: UPLOAD_SUCCESS_MESSAGE.to_string(),
        count,
    }))
}

/// Any other method on the upload route
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}
