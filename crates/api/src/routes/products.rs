//! Product catalog endpoints.

use axum::extract::State;
use common::ProductId;
use domain::{PageView, ProductRequest, ProductView};
use serde::Deserialize;
use store::PageRequest;

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageParams {
    fn request(&self) -> PageRequest {
        page_request(self.page, self.size)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

fn page_request(page: Option<u32>, size: Option<u32>) -> PageRequest {
    PageRequest::new(page.unwrap_or(0), size.unwrap_or(PageRequest::DEFAULT_SIZE))
}

/// GET /api/products
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<axum::Json<PageView<ProductView>>, ApiError> {
    Ok(axum::Json(state.catalog.list_products(params.request()).await?))
}

/// GET /api/products/search?q=
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<axum::Json<PageView<ProductView>>, ApiError> {
    let page = state
        .catalog
        .search_products(&params.q, page_request(params.page, params.size))
        .await?;
    Ok(axum::Json(page))
}

/// GET /api/products/{id}: active products only.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<axum::Json<ProductView>, ApiError> {
    state
        .catalog
        .find_product(id)
        .await?
        .map(axum::Json)
        .ok_or_else(|| ApiError::NotFound("Prodotto non trovato".into()))
}

/// POST /api/products
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<ProductRequest>,
) -> Result<axum::Json<ProductView>, ApiError> {
    Ok(axum::Json(state.catalog.create_product(request).await?))
}
