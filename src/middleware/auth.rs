// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Caller identification from the auth provider's JWTs.
//!
//! With `AUTH_JWT_SECRET` configured every protected request must carry a
//! valid HS256 bearer token and may only touch its own user id. Without it
//! the caller is anonymous and user ids in requests are taken at face value.

use crate::error::AppError;
use crate::models::UserId;
use crate::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (auth provider user id)
    pub sub: String,
    /// Audience
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: usize,
}

/// Who made the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Auth is not configured; ids in the request are trusted.
    Anonymous,
    /// Verified token holder.
    User(UserId),
}

impl Caller {
    /// Allow acting on `user_id`'s data.
    pub fn authorize(&self, user_id: &UserId) -> Result<(), AppError> {
        match self {
            Caller::Anonymous => Ok(()),
            Caller::User(caller) if caller == user_id => Ok(()),
            Caller::User(caller) => {
                tracing::warn!(
                    caller = %caller,
                    user_id = %user_id,
                    "Caller tried to act on another user's data"
                );
                Err(AppError::Forbidden(
                    "Cannot access another user's data".to_string(),
                ))
            }
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only the authenticate middleware inserts a Caller; without it, refuse
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Middleware identifying the caller of protected routes.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = match &state.config.auth_jwt_secret {
        None => Caller::Anonymous,
        Some(secret) => {
            let token = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .ok_or(AppError::Unauthorized)?;

            let claims = verify_token(token, secret, &state.config.auth_jwt_audience)?;
            let user_id = UserId::parse(&claims.sub).map_err(|_| AppError::Unauthorized)?;
            Caller::User(user_id)
        }
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Decode and validate a token.
pub fn verify_token(token: &str, secret: &[u8], audience: &str) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            AppError::Unauthorized
        })
}

/// Create a token the way the auth provider does (used by tests and local tooling).
pub fn create_token(
    user_id: &UserId,
    secret: &[u8],
    audience: &str,
    ttl_secs: usize,
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        aud: audience.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}
