use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session token claims. `sub` carries the owning user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id.into(),
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Identity resolved from a session credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session secret not configured")]
    InvalidSecret,

    #[error("Session token has no user id")]
    MissingUserId,

    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    #[error("Token generation error: {0}")]
    TokenGeneration(String),
}

/// Resolves a raw credential into the user it belongs to.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<SessionUser, SessionError>;
}

/// HS256 JWT sessions signed with a shared secret.
pub struct JwtSessionVerifier {
    secret: String,
}

impl JwtSessionVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

#[async_trait]
impl SessionVerifier for JwtSessionVerifier {
    async fn verify(&self, credential: &str) -> Result<SessionUser, SessionError> {
        let claims = validate_jwt(&self.secret, credential)?;

        if claims.sub.trim().is_empty() {
            return Err(SessionError::MissingUserId);
        }

        Ok(SessionUser { id: claims.sub })
    }
}

pub fn generate_jwt(secret: &str, claims: &Claims) -> Result<String, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| SessionError::TokenGeneration(e.to_string()))
}

fn validate_jwt(secret: &str, token: &str) -> Result<Claims, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| SessionError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims)
}
