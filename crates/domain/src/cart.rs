//! Shopping cart service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::{Cart, CartLine, Store, Transaction};
use validator::Validate;

use crate::error::{Result, ShopError, validate_request};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    #[validate(required(message = "ID prodotto è obbligatorio"))]
    pub product_id: Option<ProductId>,

    #[validate(
        required(message = "Quantità è obbligatoria"),
        range(min = 1, message = "Quantità deve essere almeno 1")
    )]
    pub quantity: Option<i32>,
}

impl CartItemRequest {
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id: Some(product_id),
            quantity: Some(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: CartId,
    pub items: Vec<CartItemView>,
    pub total_amount: Money,
    pub total_items: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub product_image_url: Option<String>,
    pub quantity: i32,
    pub total_price: Money,
    pub product_in_stock: bool,
}

impl CartView {
    fn from_lines(cart: &Cart, lines: &[CartLine]) -> Result<Self> {
        let items = lines
            .iter()
            .map(|line| {
                Ok(CartItemView {
                    id: line.item.id,
                    product_id: line.product.id,
                    product_name: line.product.name.clone(),
                    unit_price: line.product.price,
                    product_image_url: line.product.image_url.clone(),
                    quantity: line.item.quantity,
                    total_price: line
                        .total_price()
                        .ok_or_else(ShopError::amount_out_of_range)?,
                    product_in_stock: line.product.in_stock(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: cart.id,
            total_amount: CartLine::total_of(lines).ok_or_else(ShopError::amount_out_of_range)?,
            total_items: lines.iter().map(|l| i64::from(l.item.quantity)).sum(),
            items,
            updated_at: cart.updated_at.unwrap_or(cart.created_at),
        })
    }
}

/// Manages the per-user cart. Carts are created lazily on first add.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn ensure_user(tx: &mut dyn Transaction, user_id: UserId) -> Result<()> {
        if tx.find_user(user_id).await?.is_none() {
            return Err(ShopError::invalid_input("Utente non trovato"));
        }
        Ok(())
    }

    async fn existing_cart(tx: &mut dyn Transaction, user_id: UserId) -> Result<Cart> {
        tx.find_cart_by_user(user_id)
            .await?
            .ok_or_else(|| ShopError::invalid_input("Carrello non trovato"))
    }

    async fn view(tx: &mut dyn Transaction, user_id: UserId) -> Result<CartView> {
        let cart = Self::existing_cart(tx, user_id).await?;
        let lines = tx.list_cart_lines(cart.id).await?;
        CartView::from_lines(&cart, &lines)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView> {
        let mut tx = self.store.begin().await?;
        Self::ensure_user(tx.as_mut(), user_id).await?;
        let view = Self::view(tx.as_mut(), user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Adds a product, summing quantities when it is already in the cart.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(&self, user_id: UserId, request: CartItemRequest) -> Result<CartView> {
        validate_request(&request)?;
        let (Some(product_id), Some(quantity)) = (request.product_id, request.quantity) else {
            return Err(ShopError::Internal(
                "cart request passed validation without product or quantity".into(),
            ));
        };

        let mut tx = self.store.begin().await?;
        Self::ensure_user(tx.as_mut(), user_id).await?;

        let product = tx
            .find_product(product_id)
            .await?
            .ok_or_else(|| ShopError::invalid_input("Prodotto non trovato"))?;

        let cart = tx.find_or_create_cart(user_id).await?;
        let in_cart = tx
            .list_cart_lines(cart.id)
            .await?
            .iter()
            .find(|line| line.product.id == product.id)
            .map_or(0, |line| line.item.quantity);
        let wanted = in_cart.checked_add(quantity);
        if wanted.is_none_or(|wanted| wanted > product.stock_quantity) {
            return Err(ShopError::invalid_input("Quantità non disponibile"));
        }

        let item = tx.upsert_cart_item(cart.id, product.id, quantity).await?;
        tracing::debug!(cart_id = %cart.id, product_id = %product.id, quantity = item.quantity, "cart item upserted");

        let view = Self::view(tx.as_mut(), user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_from_cart(&self, user_id: UserId, product_id: ProductId) -> Result<CartView> {
        let mut tx = self.store.begin().await?;
        Self::ensure_user(tx.as_mut(), user_id).await?;
        if tx.find_product(product_id).await?.is_none() {
            return Err(ShopError::invalid_input("Prodotto non trovato"));
        }
        let cart = Self::existing_cart(tx.as_mut(), user_id).await?;

        if !tx.delete_cart_item(cart.id, product_id).await? {
            return Err(ShopError::invalid_input("Prodotto non nel carrello"));
        }

        let view = Self::view(tx.as_mut(), user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Removes every item; the cart itself is kept.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        Self::ensure_user(tx.as_mut(), user_id).await?;
        let cart = Self::existing_cart(tx.as_mut(), user_id).await?;
        let removed = tx.clear_cart(cart.id).await?;
        tx.commit().await?;
        tracing::debug!(cart_id = %cart.id, removed, "cart cleared");
        Ok(())
    }
}
