//! Password hashing, signed session tokens and the request extractor that
//! enforces them.
//!
//! Tokens are HS256 JWTs carrying the user id, so they survive a server
//! restart as long as the signing secret does. Logout records the token's
//! `jti` as revoked until the token would have expired anyway.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::api::{ApiError, SharedState};
use crate::models::UserId;

pub const SESSION_COOKIE: &str = "token";

pub fn session_ttl() -> Duration {
    Duration::hours(24)
}

/// Random signing secret for a store that has none configured.
pub fn new_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    jti: String,
    iat: i64,
    exp: i64,
}

/// A logged-out token, kept until its original expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedSession {
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks signed session tokens.
pub struct SessionStore {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    revoked: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SessionStore {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            revoked: Mutex::new(HashMap::new()),
        }
    }

    /// Restore revocations persisted by an earlier run.
    pub fn with_revoked(self, revoked: impl IntoIterator<Item = RevokedSession>) -> Self {
        self.lock()
            .extend(revoked.into_iter().map(|r| (r.jti, r.expires_at)));
        self
    }

    pub fn issue(&self, user_id: &UserId) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    fn claims(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims)
    }

    /// The owner of `token` if its signature checks out, it has not expired
    /// and it was not logged out.
    pub fn resolve(&self, token: &str) -> Option<UserId> {
        let claims = self.claims(token)?;
        if self.lock().contains_key(&claims.jti) {
            return None;
        }
        Some(UserId::new(claims.sub))
    }

    /// Revoke a live token. Returns the entry to persist, or `None` when the
    /// token was invalid or already revoked.
    pub fn revoke(&self, token: &str) -> Option<RevokedSession> {
        let claims = self.claims(token)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)?;
        let now = Utc::now();
        let mut revoked = self.lock();
        revoked.retain(|_, until| *until > now);
        if revoked.insert(claims.jti.clone(), expires_at).is_some() {
            return None;
        }
        Some(RevokedSession {
            jti: claims.jti,
            expires_at,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.revoked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Session token from `Authorization: Bearer` or, failing that, the cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Extractor for handlers that require a logged-in user.
pub struct AuthUser(pub UserId);

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;
        state
            .sessions
            .resolve(&token)
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized("Session expired or invalid".into()))
    }
}
