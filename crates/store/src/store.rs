use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CategoryId, OrderId, ProductId, UserId};

use crate::{
    Cart, CartItem, CartLine, Category, NewCategory, NewOrder, NewOrderItem, NewProduct, NewUser,
    Order, OrderItem, OrderLine, Page, PageRequest, Product, Result, User,
};

/// Entry point for all persistence.
///
/// Implementations must be thread-safe; a single store is shared by every
/// request handler.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction. Nothing written through it is visible to other
    /// transactions until [`Transaction::commit`].
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

#[async_trait]
pub trait UserRepository: Send {
    /// Fails with `UniqueViolation` when the email is taken.
    async fn insert_user(&mut self, user: NewUser) -> Result<User>;

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait CategoryRepository: Send {
    /// Fails with `UniqueViolation` when the name is taken.
    async fn insert_category(&mut self, category: NewCategory) -> Result<Category>;

    async fn find_category(&mut self, id: CategoryId) -> Result<Option<Category>>;

    async fn find_category_by_name(&mut self, name: &str) -> Result<Option<Category>>;

    /// Active categories ordered by name.
    async fn list_active_categories(&mut self) -> Result<Vec<Category>>;
}

#[async_trait]
pub trait ProductRepository: Send {
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product>;

    /// Finds a product regardless of its `active` flag.
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Active products ordered by id.
    async fn list_active_products(&mut self, page: PageRequest) -> Result<Page<Product>>;

    /// Active products whose name or description contains `query`,
    /// ignoring case.
    async fn search_active_products(
        &mut self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<Product>>;

    /// Atomically subtracts `quantity` from the product's stock.
    ///
    /// Fails with `InsufficientStock` and leaves the row untouched when the
    /// current stock is lower than `quantity`. Concurrent callers on the same
    /// product are serialized on the row.
    async fn decrease_stock(&mut self, id: ProductId, quantity: i32) -> Result<Product>;
}

#[async_trait]
pub trait CartRepository: Send {
    async fn find_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Returns the user's cart, creating it on first use.
    async fn find_or_create_cart(&mut self, user_id: UserId) -> Result<Cart>;

    /// Items of the cart joined with their products, in insertion order.
    async fn list_cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>>;

    /// Adds `quantity` of a product; an existing `(cart, product)` pair has
    /// its quantity increased instead of a second row being created.
    async fn upsert_cart_item(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem>;

    /// Returns `false` when the product was not in the cart.
    async fn delete_cart_item(&mut self, cart_id: CartId, product_id: ProductId) -> Result<bool>;

    /// Removes every item. The cart row itself is kept.
    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64>;
}

#[async_trait]
pub trait OrderRepository: Send {
    /// Fails with `UniqueViolation` on a duplicate order number.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem>;

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn list_order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Orders of the user, newest first.
    async fn list_user_orders(&mut self, user_id: UserId) -> Result<Vec<Order>>;

    /// Counts orders created within `[from, to]`, both ends inclusive.
    ///
    /// A failure here does not invalidate the surrounding transaction.
    async fn count_user_orders_between(
        &mut self,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64>;

    /// Deletes an order and its items. Returns `false` when it did not exist.
    async fn delete_order(&mut self, id: OrderId) -> Result<bool>;
}

/// A unit of work over every repository.
#[async_trait]
pub trait Transaction:
    UserRepository + CategoryRepository + ProductRepository + CartRepository + OrderRepository
{
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
