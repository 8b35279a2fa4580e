mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{token_for, Part, TestApp};
use feedback_ingest::config::PersistMode;
use feedback_ingest::database::{Feedback, FeedbackStore, MemoryFeedbackStore, NewFeedback, StoreError};

/// Writes into a memory store, but only after sleeping past any sane deadline.
struct StalledStore {
    inner: Arc<MemoryFeedbackStore>,
    delay: Duration,
}

#[async_trait]
impl FeedbackStore for StalledStore {
    async fn insert_batch(&self, user_id: &str, rows: &[NewFeedback]) -> Result<Vec<Feedback>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_batch(user_id, rows).await
    }

    async fn insert_one(&self, user_id: &str, row: &NewFeedback) -> Result<Feedback, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_one(user_id, row).await
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, StoreError> {
        self.inner.count_for_user(user_id).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

const THREE_ROWS: &str = "content\nfirst\nrejected\nthird\n";

#[tokio::test]
async fn transactional_failure_stores_nothing() {
    let app = TestApp::with(MemoryFeedbackStore::rejecting("rejected"), |config| {
        config.upload.persist_mode = PersistMode::Transactional;
    });

    let (status, body) = app.upload(Some(&token_for("u1")), &[Part::csv(THREE_ROWS)]).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "PERSISTENCE_ERROR");
    assert_eq!(
        body["message"],
        "An error occurred while inserting data into the database"
    );
    assert_eq!(body["persisted"], 0);
    assert_eq!(body["failed_rows"][0]["line"], 3);
    assert!(app.store.records().await.is_empty());
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn best_effort_keeps_the_rows_that_landed() {
    let app = TestApp::with(MemoryFeedbackStore::rejecting("rejected"), |config| {
        config.upload.persist_mode = PersistMode::BestEffort;
    });

    let (status, body) = app.upload(Some(&token_for("u1")), &[Part::csv(THREE_ROWS)]).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "PERSISTENCE_ERROR");
    assert_eq!(body["persisted"], 2);

    let failed = body["failed_rows"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["line"], 3);

    let mut stored = app.contents_for("u1").await;
    stored.sort();
    assert_eq!(stored, vec!["first", "third"]);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn best_effort_success_looks_like_transactional_success() {
    let app = TestApp::with(MemoryFeedbackStore::new(), |config| {
        config.upload.persist_mode = PersistMode::BestEffort;
    });

    let (status, body) = app
        .upload(Some(&token_for("u1")), &[Part::csv("content\n\"hello\"\n\"world\"\n")])
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Feedback uploaded successfully");
    assert_eq!(body["count"], 2);

    let mut stored = app.contents_for("u1").await;
    stored.sort();
    assert_eq!(stored, vec!["hello", "world"]);
}

#[tokio::test]
async fn slow_store_hits_the_processing_timeout() {
    let store = Arc::new(MemoryFeedbackStore::new());
    let stalled = Arc::new(StalledStore {
        inner: store.clone(),
        delay: Duration::from_secs(5),
    });
    let app = TestApp::with_backend(store, stalled, |config| {
        config.upload.timeout_secs = 1;
    });

    let started = std::time::Instant::now();
    let (status, body) = app
        .upload(Some(&token_for("u1")), &[Part::csv("content\n\"hello\"\n")])
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["message"], "Upload processing timed out");
    assert!(started.elapsed() < Duration::from_secs(4));

    // The abandoned insert never lands
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(app.store.records().await.is_empty());
    assert_eq!(app.staged_files(), 0);
}
