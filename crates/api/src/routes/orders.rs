//! Order placement and lookup endpoints.

use axum::extract::State;
use common::{OrderId, UserId};
use domain::{CreateOrderRequest, OrderView};

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::state::AppState;

/// POST /api/orders/{user_id}: turns the user's cart into an order.
#[tracing::instrument(skip(state, request))]
pub async fn create(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<axum::Json<OrderView>, ApiError> {
    Ok(axum::Json(state.orders.create_order(user_id, request).await?))
}

/// GET /api/orders/user/{user_id}: newest first.
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<axum::Json<Vec<OrderView>>, ApiError> {
    Ok(axum::Json(state.orders.get_user_orders(user_id).await?))
}

/// GET /api/orders/{order_id}: `null` when there is no such order.
pub async fn get(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<axum::Json<Option<OrderView>>, ApiError> {
    Ok(axum::Json(state.orders.find_by_id(order_id).await?))
}
