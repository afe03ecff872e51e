//! Shopping cart endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use common::{ProductId, UserId};
use domain::{CartItemRequest, CartView};

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::state::AppState;

/// GET /api/cart/{user_id}
pub async fn get(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<axum::Json<CartView>, ApiError> {
    Ok(axum::Json(state.carts.get_cart(user_id).await?))
}

/// POST /api/cart/{user_id}/add
pub async fn add(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(request): Json<CartItemRequest>,
) -> Result<axum::Json<CartView>, ApiError> {
    Ok(axum::Json(state.carts.add_to_cart(user_id, request).await?))
}

/// DELETE /api/cart/{user_id}/product/{product_id}
pub async fn remove(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(UserId, ProductId)>,
) -> Result<axum::Json<CartView>, ApiError> {
    Ok(axum::Json(
        state.carts.remove_from_cart(user_id, product_id).await?,
    ))
}

/// DELETE /api/cart/{user_id}/clear
pub async fn clear(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, ApiError> {
    state.carts.clear_cart(user_id).await?;
    Ok(StatusCode::OK)
}
