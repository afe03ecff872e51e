//! Category endpoints.

use axum::extract::State;
use common::CategoryId;
use domain::{CategoryRequest, CategoryView};

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::state::AppState;

/// GET /api/categories: active categories by name.
pub async fn list(State(state): State<AppState>) -> Result<axum::Json<Vec<CategoryView>>, ApiError> {
    Ok(axum::Json(state.catalog.list_categories().await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<axum::Json<CategoryView>, ApiError> {
    state
        .catalog
        .find_category(id)
        .await?
        .map(axum::Json)
        .ok_or_else(|| ApiError::NotFound("Categoria non trovata".into()))
}

/// POST /api/categories
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CategoryRequest>,
) -> Result<axum::Json<CategoryView>, ApiError> {
    Ok(axum::Json(state.catalog.create_category(request).await?))
}
