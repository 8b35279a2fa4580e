#![allow(dead_code)]

use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use feedback_ingest::auth::{generate_jwt, Claims, JwtSessionVerifier};
use feedback_ingest::config::AppConfig;
use feedback_ingest::database::{FeedbackStore, MemoryFeedbackStore};
use feedback_ingest::{router, AppState};

pub const SECRET: &str = "integration-test-secret";
pub const BOUNDARY: &str = "feedback-test-boundary";

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
            .with_test_writer()
            .try_init();
    });
}

/// Router wired to an in-memory store and a private staging directory.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryFeedbackStore>,
    pub staging: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(MemoryFeedbackStore::new(), |_| {})
    }

    pub fn with(store: MemoryFeedbackStore, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let store = Arc::new(store);
        Self::with_backend(store.clone(), store, tweak)
    }

    /// Serve through `backend`, which is expected to write into `store`.
    pub fn with_backend(
        store: Arc<MemoryFeedbackStore>,
        backend: Arc<dyn FeedbackStore>,
        tweak: impl FnOnce(&mut AppConfig),
    ) -> Self {
        init_tracing();

        let staging = tempfile::tempdir().expect("failed to create staging dir");
        let mut config = AppConfig::development();
        config.security.jwt_secret = SECRET.to_string();
        config.upload.staging_dir = Some(staging.path().to_path_buf());
        tweak(&mut config);

        let state = AppState::new(config, backend, Arc::new(JwtSessionVerifier::new(SECRET)));

        Self {
            router: router(state),
            store,
            staging,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn upload(&self, token: Option<&str>, parts: &[Part]) -> (StatusCode, Value) {
        self.request(upload_request(token, parts)).await
    }

    /// Number of files left behind in the staging directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.staging.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub async fn contents_for(&self, user_id: &str) -> Vec<String> {
        self.store
            .records_for(user_id)
            .await
            .into_iter()
            .map(|record| record.content)
            .collect()
    }
}

pub fn token_for(user_id: &str) -> String {
    generate_jwt(SECRET, &Claims::new(user_id, 1)).expect("failed to mint token")
}

pub struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Part {
    pub fn csv(bytes: impl Into<Vec<u8>>) -> Self {
        Self::file("file", "feedback.csv", "text/csv", bytes)
    }

    pub fn file(name: &str, file_name: &str, content_type: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: Some(content_type.to_string()),
            bytes: bytes.into(),
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            content_type: None,
            bytes: value.as_bytes().to_vec(),
        }
    }
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();

    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = &part.file_name {
            disposition.push_str(&format!("; filename=\"{}\"", file_name));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = &part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(token: Option<&str>, parts: &[Part]) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    builder
        .body(Body::from(multipart_body(parts)))
        .expect("failed to build request")
}

/// Serve the router on a free local port and return its base URL.
pub async fn serve(router: Router) -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(format!("http://127.0.0.1:{}", port))
}
