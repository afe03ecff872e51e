//! The create-order command.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use store::{
    CartLine, NewOrder, NewOrderItem, Order, OrderLine, OrderStatus, Store, StoreError,
    Transaction,
};
use uuid::Uuid;

use super::{CreateOrderRequest, OrderMapper, OrderView};
use crate::clock::Clock;
use crate::error::{Result, ShopError};
use crate::events::{EventPublisher, OrderCreated, ShopEvent};
use crate::validation::ValidatorChain;

/// A unit of work that can undo itself.
#[async_trait]
pub trait OrderCommand: Send {
    type Output;

    async fn execute(&mut self) -> Result<Self::Output>;

    /// Compensates whatever `execute` left behind. Must be safe to call when
    /// there is nothing to undo; never fails.
    async fn rollback(&mut self) {}
}

/// Builds an order number of the form `ORD-<epoch millis>-<8 upper hex>`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("ORD-{}-{}", now.timestamp_millis(), suffix)
}

/// Turns a user's cart into a persisted order.
///
/// One execution runs in one store transaction: the cart is loaded, the
/// validator chain applied, the order and its items written, stock
/// decremented and the cart emptied. `OrderCreated` is published only after
/// the commit succeeds.
pub struct CreateOrderCommand {
    store: Arc<dyn Store>,
    chain: Arc<ValidatorChain>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    user_id: UserId,
    request: CreateOrderRequest,
    created_order: Option<Order>,
}

impl CreateOrderCommand {
    pub fn new(
        store: Arc<dyn Store>,
        chain: Arc<ValidatorChain>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        user_id: UserId,
        request: CreateOrderRequest,
    ) -> Self {
        Self {
            store,
            chain,
            publisher,
            clock,
            user_id,
            request,
            created_order: None,
        }
    }

    /// The order written by the last execution, if any.
    pub fn created_order(&self) -> Option<&Order> {
        self.created_order.as_ref()
    }

    async fn run(
        &mut self,
        tx: &mut dyn Transaction,
        staged: &mut Vec<ShopEvent>,
    ) -> Result<OrderView> {
        let user = tx
            .find_user(self.user_id)
            .await?
            .ok_or_else(|| ShopError::invalid_input("Utente non trovato"))?;

        let cart = tx
            .find_cart_by_user(user.id)
            .await?
            .ok_or_else(|| ShopError::invalid_input("Carrello vuoto"))?;

        let lines = tx.list_cart_lines(cart.id).await?;

        self.chain.validate(tx, user.id, &lines).await?;

        let total_amount = CartLine::total_of(&lines).ok_or_else(ShopError::amount_out_of_range)?;
        let now = self.clock.now();

        let order = tx
            .insert_order(NewOrder {
                order_number: generate_order_number(now),
                user_id: user.id,
                status: OrderStatus::Pending,
                total_amount,
                shipping_address: self.request.shipping_address.trim().to_string(),
                notes: self.request.notes.clone(),
                created_at: now,
            })
            .await?;
        self.created_order = Some(order.clone());

        staged.push(
            OrderCreated {
                order_id: order.id,
                user_email: user.email.clone(),
                order_number: order.order_number.clone(),
            }
            .into(),
        );

        let mut order_lines = Vec::with_capacity(lines.len());
        for line in &lines {
            let unit_price = line.product.price;
            let total_price = line
                .total_price()
                .ok_or_else(ShopError::amount_out_of_range)?;
            let item = tx
                .insert_order_item(NewOrderItem {
                    order_id: order.id,
                    product_id: line.product.id,
                    quantity: line.item.quantity,
                    unit_price,
                    total_price,
                })
                .await?;

            tx.decrease_stock(line.product.id, line.item.quantity)
                .await
                .map_err(|e| match e {
                    StoreError::InsufficientStock { .. } => ShopError::InvalidInput(format!(
                        "Stock insufficiente per '{}'",
                        line.product.name
                    )),
                    other => other.into(),
                })?;

            order_lines.push(OrderLine {
                item,
                product_name: line.product.name.clone(),
            });
        }

        tx.clear_cart(cart.id).await?;

        Ok(OrderMapper::to_view(&order, &order_lines))
    }
}

#[async_trait]
impl OrderCommand for CreateOrderCommand {
    type Output = OrderView;

    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    async fn execute(&mut self) -> Result<OrderView> {
        let started = Instant::now();
        self.created_order = None;

        let mut tx = self.store.begin().await?;
        let mut staged = Vec::new();

        match self.run(tx.as_mut(), &mut staged).await {
            Ok(view) => {
                if let Err(e) = tx.commit().await {
                    tracing::error!(error = %e, "order commit failed");
                    self.rollback().await;
                    return Err(e.into());
                }

                for event in staged {
                    self.publisher.publish(event);
                }

                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_create_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(order_number = %view.order_number, total = %view.total_amount, "order created");
                Ok(view)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::error!(error = %rollback_error, "transaction rollback failed");
                }
                self.rollback().await;
                Err(e)
            }
        }
    }

    async fn rollback(&mut self) {
        let Some(order) = self.created_order.take() else {
            return;
        };

        tracing::warn!(order_number = %order.order_number, "rolling back order");
        metrics::counter!("order_rollbacks_total").increment(1);

        let store = self.store.clone();
        let order_id = order.id;
        let result = async move {
            let mut tx = store.begin().await?;
            let existed = tx.delete_order(order_id).await?;
            tx.commit().await?;
            Ok::<_, StoreError>(existed)
        }
        .await;

        match result {
            Ok(true) => tracing::info!(order_number = %order.order_number, "order rolled back"),
            Ok(false) => tracing::debug!(order_number = %order.order_number, "nothing to roll back"),
            Err(e) => {
                tracing::error!(order_number = %order.order_number, error = %e, "order rollback failed")
            }
        }
    }
}
