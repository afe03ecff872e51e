//! Registration and login endpoints.

use axum::extract::State;
use domain::{LoginRequest, RegisterRequest, UserView};
use serde::Serialize;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::extract::Json;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub user: UserView,
}

fn respond(state: &AppState, user: UserView) -> Result<axum::Json<AuthResponse>, ApiError> {
    Ok(axum::Json(AuthResponse {
        token: state.jwt.issue(&user.email)?,
        token_type: "Bearer",
        user,
    }))
}

/// POST /api/auth/register
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<axum::Json<AuthResponse>, ApiError> {
    let user = state.users.register(request).await?;
    respond(&state, user)
}

/// POST /api/auth/login
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<axum::Json<AuthResponse>, ApiError> {
    let user = state.users.login(request).await?;
    respond(&state, user)
}

/// GET /api/auth/me: the caller behind the bearer token.
pub async fn me(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<axum::Json<UserView>, ApiError> {
    state
        .users
        .find_by_id(caller.id)
        .await?
        .map(axum::Json)
        .ok_or(ApiError::Unauthorized)
}
