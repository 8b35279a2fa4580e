use std::path::Path;

use serde_json::json;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::client::{UploadClient, UploadStatus, FALLBACK_ERROR_MESSAGE};

pub async fn handle(
    server: &str,
    token: Option<String>,
    file: &Path,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    if token.is_none() {
        tracing::warn!("No session token configured; the server will reject the upload");
    }

    let mut client = UploadClient::new(server, token)?;

    if matches!(output_format, OutputFormat::Text) {
        println!("Uploading feedback from {}...", file.display());
    }

    match client.submit_file(file).await {
        UploadStatus::Success => output_success(
            &output_format,
            client.message().unwrap_or("Feedback uploaded successfully!"),
            Some(json!({ "status": UploadStatus::Success, "file": file.display().to_string() })),
        ),
        status => {
            let message = client.error_message().unwrap_or(FALLBACK_ERROR_MESSAGE).to_string();
            output_error(&output_format, &message, Some("UPLOAD_FAILED"))?;
            anyhow::bail!("upload ended with status '{}'", status)
        }
    }
}
