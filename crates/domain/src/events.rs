//! Domain events and the port they are published through.

use std::sync::{Arc, PoisonError, RwLock};

use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

/// Emitted once for every committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub user_email: String,
    pub order_number: String,
}

/// Emitted once for every committed registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ShopEvent {
    OrderCreated(OrderCreated),
    UserRegistered(UserRegistered),
}

impl ShopEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ShopEvent::OrderCreated(_) => "OrderCreated",
            ShopEvent::UserRegistered(_) => "UserRegistered",
        }
    }
}

impl From<OrderCreated> for ShopEvent {
    fn from(event: OrderCreated) -> Self {
        ShopEvent::OrderCreated(event)
    }
}

impl From<UserRegistered> for ShopEvent {
    fn from(event: UserRegistered) -> Self {
        ShopEvent::UserRegistered(event)
    }
}

/// Hands events to whoever consumes them.
///
/// `publish` must return without waiting on consumers. Services call it only
/// after their transaction has committed.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ShopEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventPublisher;

impl EventPublisher for NoOpEventPublisher {
    fn publish(&self, _event: ShopEvent) {}
}

/// Records published events (for testing).
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    events: Arc<RwLock<Vec<ShopEvent>>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<ShopEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn order_created(&self) -> Vec<OrderCreated> {
        self.published()
            .into_iter()
            .filter_map(|e| match e {
                ShopEvent::OrderCreated(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventPublisher for InMemoryEventPublisher {
    fn publish(&self, event: ShopEvent) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
