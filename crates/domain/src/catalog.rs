//! Product and category catalog.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{CategoryId, Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{
    Category, NewCategory, NewProduct, Page, PageRequest, Product, Store, StoreError, Transaction,
};
use validator::{Validate, ValidationError};

use crate::error::{Result, ShopError, validate_request};
use crate::rules::{not_blank, rule_error};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "price_in_range", skip_on_field_errors = false))]
pub struct ProductRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Nome prodotto è obbligatorio"))]
    pub name: String,

    pub description: Option<String>,

    #[validate(required(message = "Prezzo è obbligatorio"))]
    pub price: Option<Money>,

    #[validate(
        required(message = "Quantità stock è obbligatoria"),
        range(min = 0, message = "Quantità non può essere negativa")
    )]
    pub stock_quantity: Option<i32>,

    pub image_url: Option<String>,
    pub brand: Option<String>,

    #[validate(required(message = "Categoria è obbligatoria"))]
    pub category_id: Option<CategoryId>,
}

/// Largest price the `products.price` column (`NUMERIC(10, 2)`) holds.
pub const MAX_PRICE_CENTS: i64 = 9_999_999_999;

fn price_in_range(request: &ProductRequest) -> std::result::Result<(), ValidationError> {
    match request.price {
        Some(price) if price < Money::from_cents(1) => Err(rule_error(
            "price_min",
            "Prezzo deve essere maggiore di 0",
        )),
        Some(price) if price > Money::from_cents(MAX_PRICE_CENTS) => Err(rule_error(
            "price_max",
            "Prezzo non può superare €99999999.99",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Nome categoria è obbligatorio"))]
    pub name: String,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            description: category.description.clone(),
            active: category.active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub brand: Option<String>,
    pub active: bool,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub category: Option<CategoryView>,
}

impl ProductView {
    fn new(product: Product, category: Option<CategoryView>) -> Self {
        Self {
            in_stock: product.in_stock(),
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock_quantity: product.stock_quantity,
            image_url: product.image_url,
            brand: product.brand,
            active: product.active,
            created_at: product.created_at,
            category,
        }
    }
}

/// A page of results as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub content: Vec<T>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_elements: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> From<Page<T>> for PageView<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            current_page: page.request.page,
            total_pages: page.total_pages(),
            total_elements: page.total_elements,
            has_next: page.has_next(),
            has_previous: page.has_previous(),
            content: page.items,
        }
    }
}

/// Reads and maintains the catalog. Only active rows are visible to
/// customers.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn with_categories(
        tx: &mut dyn Transaction,
        page: Page<Product>,
    ) -> Result<PageView<ProductView>> {
        let mut categories: HashMap<CategoryId, Option<CategoryView>> = HashMap::new();
        for product in &page.items {
            if !categories.contains_key(&product.category_id) {
                let category = tx.find_category(product.category_id).await?;
                categories.insert(product.category_id, category.as_ref().map(CategoryView::from));
            }
        }

        Ok(page
            .map(|product| {
                let category = categories.get(&product.category_id).cloned().flatten();
                ProductView::new(product, category)
            })
            .into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_product(&self, request: ProductRequest) -> Result<ProductView> {
        validate_request(&request)?;
        let (Some(price), Some(stock_quantity), Some(category_id)) =
            (request.price, request.stock_quantity, request.category_id)
        else {
            return Err(ShopError::Internal(
                "product request passed validation with missing fields".into(),
            ));
        };

        let mut tx = self.store.begin().await?;
        let category = tx
            .find_category(category_id)
            .await?
            .ok_or_else(|| ShopError::invalid_input("Categoria non trovata"))?;

        let product = tx
            .insert_product(NewProduct {
                name: request.name.trim().to_string(),
                description: request.description,
                price,
                stock_quantity,
                image_url: request.image_url,
                brand: request.brand,
                category_id: category.id,
                active: true,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, name = %product.name, "product created");
        Ok(ProductView::new(product, Some(CategoryView::from(&category))))
    }

    /// Returns the product only while it is active.
    #[tracing::instrument(skip(self))]
    pub async fn find_product(&self, id: ProductId) -> Result<Option<ProductView>> {
        let mut tx = self.store.begin().await?;
        let Some(product) = tx.find_product(id).await?.filter(|p| p.active) else {
            return Ok(None);
        };
        let category = tx.find_category(product.category_id).await?;
        tx.commit().await?;
        Ok(Some(ProductView::new(
            product,
            category.as_ref().map(CategoryView::from),
        )))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, page: PageRequest) -> Result<PageView<ProductView>> {
        let mut tx = self.store.begin().await?;
        let products = tx.list_active_products(page).await?;
        let view = Self::with_categories(tx.as_mut(), products).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Matches name or description, ignoring case.
    #[tracing::instrument(skip(self))]
    pub async fn search_products(
        &self,
        query: &str,
        page: PageRequest,
    ) -> Result<PageView<ProductView>> {
        let mut tx = self.store.begin().await?;
        let products = tx.search_active_products(query.trim(), page).await?;
        let view = Self::with_categories(tx.as_mut(), products).await?;
        tx.commit().await?;
        Ok(view)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategoryView>> {
        let mut tx = self.store.begin().await?;
        let categories = tx.list_active_categories().await?;
        tx.commit().await?;
        Ok(categories.iter().map(CategoryView::from).collect())
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_category(&self, id: CategoryId) -> Result<Option<CategoryView>> {
        let mut tx = self.store.begin().await?;
        let category = tx.find_category(id).await?;
        tx.commit().await?;
        Ok(category.as_ref().map(CategoryView::from))
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_category(&self, request: CategoryRequest) -> Result<CategoryView> {
        validate_request(&request)?;
        let name = request.name.trim().to_string();
        let duplicate = || {
            ShopError::invalid_input(format!("Esiste già una categoria con nome: {name}"))
        };

        let mut tx = self.store.begin().await?;
        if tx.find_category_by_name(&name).await?.is_some() {
            return Err(duplicate());
        }

        let category = tx
            .insert_category(NewCategory {
                name: name.clone(),
                description: request.description,
                active: request.active.unwrap_or(true),
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => duplicate(),
                other => other.into(),
            })?;
        tx.commit().await?;

        tracing::info!(category_id = %category.id, name = %category.name, "category created");
        Ok(CategoryView::from(&category))
    }
}
