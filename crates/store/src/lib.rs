//! Transactional persistence for the shop.
//!
//! Every service operation opens one [`Transaction`] from a [`Store`], reads
//! and writes through the repository traits, then commits or rolls back.
//! Two backends are provided: [`InMemoryStore`] for tests and local runs, and
//! [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod model;
pub mod page;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Cart, CartItem, CartLine, Category, NewCategory, NewOrder, NewOrderItem, NewProduct, NewUser,
    Order, OrderItem, OrderLine, OrderStatus, Product, Role, User,
};
pub use page::{Page, PageRequest};
pub use postgres::PostgresStore;
pub use store::{
    CartRepository, CategoryRepository, OrderRepository, ProductRepository, Store, Transaction,
    UserRepository,
};
