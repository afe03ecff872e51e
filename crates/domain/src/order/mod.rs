//! Order placement and lookup.
//!
//! [`OrderService`] is the entry point: it builds a [`CreateOrderCommand`]
//! per submission and answers reads through [`OrderQuery`].

mod command;
mod mapper;
mod query;
mod request;
mod service;
mod view;

pub use command::{CreateOrderCommand, OrderCommand, generate_order_number};
pub use mapper::OrderMapper;
pub use query::OrderQuery;
pub use request::CreateOrderRequest;
pub use service::OrderService;
pub use view::{OrderItemView, OrderView};
