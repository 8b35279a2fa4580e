use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use std::fs::File;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use super::error::IngestError;
use crate::config::{UploadConfig, CSV_MEDIA_TYPE};

/// The uploaded file spooled to disk. The backing file is removed when this
/// value is dropped, whatever path the request takes out of the pipeline.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    pub size: u64,
    pub file_name: Option<String>,
}

impl StagedUpload {
    /// Fresh read handle positioned at the start of the staged bytes.
    pub fn reopen(&self) -> std::io::Result<File> {
        self.file.reopen()
    }
}

/// Compare the declared media type against CSV, ignoring parameters and case.
pub fn is_csv_media_type(declared: &str) -> bool {
    declared
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(CSV_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Pull the single file part out of the multipart stream and spool it.
///
/// The media type is checked before any byte is written and the size is
/// checked on every chunk, so both rejections happen before decoding.
pub async fn stage_upload(multipart: &mut Multipart, config: &UploadConfig) -> Result<StagedUpload, IngestError> {
    let max_size = config.max_file_size_bytes;
    let mut staged: Option<StagedUpload> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_failure(e, max_size))?
    {
        let is_file_field = field.name() == Some(config.field_name.as_str());

        if !is_file_field {
            if field.file_name().is_some() {
                return Err(IngestError::Validation(format!(
                    "Unexpected file field '{}', files must be sent as '{}'",
                    field.name().unwrap_or_default(),
                    config.field_name
                )));
            }
            // Plain form fields carry nothing we use
            continue;
        }

        if staged.is_some() {
            return Err(IngestError::validation("Only one file may be uploaded per request"));
        }

        let declared = field.content_type().unwrap_or_default().to_string();
        if !is_csv_media_type(&declared) {
            tracing::info!(content_type = %declared, "Rejected upload with non-CSV media type");
            return Err(IngestError::validation("Only CSV files are allowed"));
        }

        let file_name = field.file_name().map(|s| s.to_string());
        let temp = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".csv")
            .tempfile_in(config.staging_dir())?;
        let mut out = tokio::fs::File::from_std(temp.as_file().try_clone()?);

        let mut size = 0u64;
        let mut chunk_number = 0u64;

        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_failure(e, max_size))? {
            chunk_number += 1;
            size += chunk.len() as u64;

            // Check size limit incrementally to fail fast
            if size > max_size {
                tracing::warn!(
                    size = size,
                    max_file_size = max_size,
                    "File size limit exceeded, aborting upload"
                );
                return Err(too_large(max_size));
            }

            out.write_all(&chunk).await?;
            tracing::trace!(chunk_number = chunk_number, size = size, "Staged chunk");
        }
        out.flush().await?;

        tracing::debug!(
            file_name = ?file_name,
            size = size,
            path = %temp.path().display(),
            "Upload staged"
        );

        staged = Some(StagedUpload {
            file: temp,
            size,
            file_name,
        });
    }

    staged.ok_or_else(|| IngestError::validation("No file uploaded"))
}

fn too_large(max_size: u64) -> IngestError {
    IngestError::Validation(format!("File exceeds the maximum allowed size of {} bytes", max_size))
}

fn multipart_failure(err: MultipartError, max_size: u64) -> IngestError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(max_size);
    }
    IngestError::Validation(format!("Failed to parse multipart data: {}", err.body_text()))
}
