use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::SessionVerifier;
use crate::config::{AppConfig, DatabaseConfig, StoreBackend};
use crate::database::{DatabaseError, DatabaseManager, FeedbackStore, MemoryFeedbackStore, PgFeedbackStore};
use crate::handlers;

/// Shared request state. Collaborators are injected here rather than looked
/// up globally so tests can swap the store and the session verifier.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn FeedbackStore>,
    pub sessions: Arc<dyn SessionVerifier>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn FeedbackStore>, sessions: Arc<dyn SessionVerifier>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            sessions,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.upload.body_limit();
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        // Public
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        // Session-protected ingestion
        .route(
            "/api/upload",
            post(handlers::upload::upload_feedback)
                .fallback(handlers::upload::method_not_allowed)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .fallback(handlers::health::not_found)
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the configured store; PostgreSQL pools get their schema ensured.
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn FeedbackStore>, DatabaseError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory feedback store; records are lost on restart");
            Ok(Arc::new(MemoryFeedbackStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(config).await?;
            DatabaseManager::ensure_schema(&pool).await?;
            Ok(Arc::new(PgFeedbackStore::new(pool, config.max_connections)))
        }
    }
}
