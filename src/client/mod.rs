//! Upload client: packages a file into a multipart body, posts it to the
//! ingestion endpoint and tracks presentation status.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::CSV_MEDIA_TYPE;

/// Relative to the server base URL so a path prefix on the base is kept.
pub const UPLOAD_PATH: &str = "api/upload";
/// Multipart field the server reads the file from by default.
pub const UPLOAD_FIELD: &str = "file";
pub const FALLBACK_ERROR_MESSAGE: &str = "Failed to upload feedback";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Idle,
    Uploading,
    Success,
    Error,
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            UploadStatus::Idle => "idle",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Success => "success",
            UploadStatus::Error => "error",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL '{0}'")]
    InvalidServerUrl(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: Option<String>,
}

pub struct UploadClient {
    http: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
    status: UploadStatus,
    message: Option<String>,
    error_message: Option<String>,
}

impl UploadClient {
    pub fn new(server: &str, token: Option<String>) -> Result<Self, ClientError> {
        let endpoint = server_url(server, UPLOAD_PATH)?;

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint,
            token: token.filter(|t| !t.trim().is_empty()),
            status: UploadStatus::Idle,
            message: None,
            error_message: None,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    /// Success message from the server after a successful upload.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Read a file from disk and upload it.
    pub async fn submit_file(&mut self, path: &Path) -> UploadStatus {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let media_type = media_type_for(&file_name);
                self.submit_bytes(&file_name, bytes, media_type).await
            }
            Err(e) => {
                self.begin();
                self.fail(format!("Failed to read {}: {}", path.display(), e))
            }
        }
    }

    /// Upload in-memory bytes under the given file name and media type.
    pub async fn submit_bytes(&mut self, file_name: &str, bytes: Vec<u8>, media_type: &str) -> UploadStatus {
        self.begin();

        let part = match Part::bytes(bytes).file_name(file_name.to_string()).mime_str(media_type) {
            Ok(part) => part,
            Err(e) => return self.fail(e.to_string()),
        };
        let form = Form::new().part(UPLOAD_FIELD, part);

        let mut request = self.http.post(self.endpoint.clone()).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(endpoint = %self.endpoint, file_name = %file_name, "Submitting upload");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return self.fail(e.to_string()),
        };

        let status = response.status();
        let body = response.json::<MessageBody>().await.ok().and_then(|b| b.message);

        if status.is_success() {
            self.status = UploadStatus::Success;
            self.message = body;
            self.status
        } else {
            tracing::debug!(status = %status, "Upload rejected by server");
            self.fail(body.unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string()))
        }
    }

    fn begin(&mut self) {
        self.status = UploadStatus::Uploading;
        self.message = None;
        self.error_message = None;
    }

    fn fail(&mut self, message: String) -> UploadStatus {
        self.status = UploadStatus::Error;
        self.error_message = Some(message);
        self.status
    }
}

/// Resolve `path` under the server base URL, keeping any path prefix the base carries.
pub fn server_url(server: &str, path: &str) -> Result<Url, ClientError> {
    let invalid = || ClientError::InvalidServerUrl(server.to_string());

    let mut base = Url::parse(server).map_err(|_| invalid())?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    base.join(path.trim_start_matches('/')).map_err(|_| invalid())
}

/// CSV files are declared as such; everything else goes out as opaque bytes.
pub fn media_type_for(file_name: &str) -> &'static str {
    let is_csv = Path::new(file_name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        CSV_MEDIA_TYPE
    } else {
        "application/octet-stream"
    }
}
