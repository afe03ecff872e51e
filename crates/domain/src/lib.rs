//! Domain layer for the shop backend.
//!
//! This crate provides:
//! - the order validator chain and its built-in policies
//! - the create-order command with compensation, and the order query side
//! - cart, catalog and account services
//! - domain events and the [`EventPublisher`] port they leave through

pub mod cart;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod events;
pub mod order;
pub mod rules;
pub mod users;
pub mod validation;

pub use cart::{CartItemRequest, CartItemView, CartService, CartView};
pub use catalog::{
    CatalogService, CategoryRequest, CategoryView, PageView, ProductRequest, ProductView,
};
pub use clock::{BusinessCalendar, Clock, FixedClock, SystemClock};
pub use error::{Result, ShopError, validate_request};
pub use events::{
    EventPublisher, InMemoryEventPublisher, NoOpEventPublisher, OrderCreated, ShopEvent,
    UserRegistered,
};
pub use order::{
    CreateOrderCommand, CreateOrderRequest, OrderCommand, OrderItemView, OrderMapper, OrderQuery,
    OrderService, OrderView,
};
pub use users::{LoginRequest, RegisterRequest, UserService, UserView};
pub use validation::{OrderPolicy, OrderValidator, ValidatorChain, ValidatorError};
