use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::app::AppState;
use crate::auth::SessionUser;
use crate::error::ApiError;

/// Resolves the caller through the injected `SessionVerifier`.
///
/// Runs before the multipart body is touched, so an anonymous request never
/// stages any bytes.
#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credential = extract_credential(&parts.headers, &state.config.security.session_cookie)
            .ok_or_else(|| {
                tracing::debug!("Upload rejected: no session credential");
                ApiError::unauthorized("Unauthorized")
            })?;

        state.sessions.verify(&credential).await.map_err(|e| {
            tracing::warn!("Session verification failed: {}", e);
            ApiError::unauthorized("Unauthorized")
        })
    }
}

/// Pulls a session credential from `Authorization: Bearer` or, failing that,
/// from the named session cookie.
pub fn extract_credential(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
