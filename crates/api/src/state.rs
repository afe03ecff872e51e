use std::sync::Arc;

use domain::{
    CartService, CatalogService, Clock, EventPublisher, OrderPolicy, OrderService, UserService,
    ValidatorChain,
};
use store::Store;

use crate::auth::JwtService;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub carts: CartService,
    pub catalog: CatalogService,
    pub users: UserService,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        policy: &OrderPolicy,
        jwt: JwtService,
    ) -> Self {
        let chain = ValidatorChain::standard(policy, clock.clone());
        tracing::info!(validators = ?chain.execution_order(), "order validators registered");

        Self {
            orders: OrderService::new(store.clone(), chain, publisher.clone(), clock),
            carts: CartService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            users: UserService::new(store, publisher),
            jwt,
        }
    }
}
