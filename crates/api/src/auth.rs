//! Bearer token issuing and the request authentication layer.

use std::time::Duration;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use common::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use store::Role;

use crate::error::ApiError;
use crate::state::AppState;

/// Token claims. The subject is the user's email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiration: Duration,
}

impl JwtService {
    pub fn new(secret: &[u8], expiration: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            expiration,
        }
    }

    pub fn issue(&self, email: &str) -> Result<String, ApiError> {
        self.issue_at(email, Utc::now())
    }

    pub fn issue_at(&self, email: &str, now: DateTime<Utc>) -> Result<String, ApiError> {
        let lifetime = i64::try_from(self.expiration.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: email.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp().saturating_add(lifetime),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation).map(|t| t.claims)
    }
}

/// The caller behind a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn resolve(state: &AppState, headers: &HeaderMap) -> Option<AuthenticatedUser> {
    let token = bearer_token(headers)?;
    let claims = match state.jwt.verify(token) {
        Ok(claims) => claims,
        Err(error) => {
            tracing::debug!(%error, "ignoring invalid bearer token");
            return None;
        }
    };

    match state.users.find_by_email(&claims.sub).await {
        Ok(Some(user)) if user.enabled => Some(AuthenticatedUser {
            id: user.id,
            email: user.email,
            role: user.role,
        }),
        Ok(_) => {
            tracing::debug!(subject = %claims.sub, "token subject is unknown or disabled");
            None
        }
        Err(error) => {
            tracing::error!(%error, "user lookup failed during authentication");
            None
        }
    }
}

/// Attaches [`AuthenticatedUser`] when the request carries a valid token.
/// Never rejects; routes decide whether they need a caller.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(user) = resolve(&state, request.headers()).await {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}
