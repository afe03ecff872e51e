use std::sync::Arc;

use common::{OrderId, UserId};
use store::Store;

use super::{OrderMapper, OrderView};
use crate::error::{Result, ShopError};

/// Read side of orders.
#[derive(Clone)]
pub struct OrderQuery {
    store: Arc<dyn Store>,
}

impl OrderQuery {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, order_id: OrderId) -> Result<Option<OrderView>> {
        let mut tx = self.store.begin().await?;
        let Some(order) = tx.find_order(order_id).await? else {
            tx.commit().await?;
            return Ok(None);
        };
        let lines = tx.list_order_lines(order.id).await?;
        tx.commit().await?;
        Ok(Some(OrderMapper::to_view(&order, &lines)))
    }

    /// Orders of the user, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_user_orders(&self, user_id: UserId) -> Result<Vec<OrderView>> {
        let mut tx = self.store.begin().await?;
        if tx.find_user(user_id).await?.is_none() {
            return Err(ShopError::invalid_input("Utente non trovato"));
        }

        let orders = tx.list_user_orders(user_id).await?;
        let mut views = Vec::with_capacity(orders.len());
        for order in &orders {
            let lines = tx.list_order_lines(order.id).await?;
            views.push(OrderMapper::to_view(order, &lines));
        }
        tx.commit().await?;
        Ok(views)
    }
}
