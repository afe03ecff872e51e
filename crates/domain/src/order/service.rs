use std::sync::Arc;

use common::{OrderId, UserId};
use store::Store;

use super::{CreateOrderCommand, CreateOrderRequest, OrderCommand, OrderQuery, OrderView};
use crate::clock::Clock;
use crate::error::{Result, validate_request};
use crate::events::EventPublisher;
use crate::validation::ValidatorChain;

/// Service for placing and reading orders.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    chain: Arc<ValidatorChain>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    query: OrderQuery,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        chain: ValidatorChain,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            query: OrderQuery::new(store.clone()),
            store,
            chain: Arc::new(chain),
            publisher,
            clock,
        }
    }

    /// Prepares a create-order command for one submission.
    pub fn init(&self, user_id: UserId, request: CreateOrderRequest) -> CreateOrderCommand {
        CreateOrderCommand::new(
            self.store.clone(),
            self.chain.clone(),
            self.publisher.clone(),
            self.clock.clone(),
            user_id,
            request,
        )
    }

    /// Validates the request, then runs a fresh create-order command.
    pub async fn create_order(
        &self,
        user_id: UserId,
        request: CreateOrderRequest,
    ) -> Result<OrderView> {
        validate_request(&request)?;
        self.init(user_id, request).execute().await
    }

    pub async fn find_by_id(&self, order_id: OrderId) -> Result<Option<OrderView>> {
        self.query.find_by_id(order_id).await
    }

    pub async fn get_user_orders(&self, user_id: UserId) -> Result<Vec<OrderView>> {
        self.query.get_user_orders(user_id).await
    }

    pub fn validators(&self) -> &ValidatorChain {
        &self.chain
    }
}
