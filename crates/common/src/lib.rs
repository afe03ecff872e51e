//! Shared types for the shop backend.
//!
//! Identifiers are thin newtypes over the database's `BIGSERIAL` keys so a
//! product id can never be passed where a user id is expected. [`Money`] is
//! the only currency representation used across crates.

pub mod ids;
pub mod money;

pub use ids::{CartId, CartItemId, CategoryId, OrderId, OrderItemId, ProductId, UserId};
pub use money::{Money, ParseMoneyError};
