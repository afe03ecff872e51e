use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, CategoryId, OrderId, OrderItemId, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Cart, CartItem, CartLine, CartRepository, Category, CategoryRepository, NewCategory, NewOrder,
    NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderLine, OrderRepository, Page,
    PageRequest, Product, ProductRepository, Result, Store, StoreError, Transaction, User,
    UserRepository,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    order_items: BTreeMap<OrderItemId, OrderItem>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_order_count: AtomicBool,
    fail_on_order_item_insert: AtomicBool,
    degraded: AtomicBool,
}

/// In-memory store for tests and local runs.
///
/// Transactions are serialized: `begin` waits until no other transaction is
/// open, then works on a private copy of the data that replaces the shared
/// state on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose rollback keeps every write made by the
    /// transaction, modelling a backend without atomic rollback.
    pub fn degraded() -> Self {
        let store = Self::default();
        store.faults.degraded.store(true, Ordering::SeqCst);
        store
    }

    /// Makes `count_user_orders_between` fail (for testing).
    pub fn set_fail_on_order_count(&self, fail: bool) {
        self.faults.fail_on_order_count.store(fail, Ordering::SeqCst);
    }

    /// Makes `insert_order_item` fail (for testing).
    pub fn set_fail_on_order_item_insert(&self, fail: bool) {
        self.faults
            .fail_on_order_item_insert
            .store(fail, Ordering::SeqCst);
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn order_item_count(&self) -> usize {
        self.state.lock().await.order_items.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            faults: self.faults.clone(),
        }))
    }
}

/// An open transaction on an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<Faults>,
}

fn paginate(products: Vec<Product>, page: PageRequest) -> Page<Product> {
    let total_elements = products.len() as u64;
    let items = products
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.size as usize)
        .collect();
    Page {
        items,
        request: page,
        total_elements,
    }
}

#[async_trait]
impl UserRepository for InMemoryTransaction {
    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        if self.working.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".into()));
        }
        let id = UserId::new(self.working.next_id());
        let row = User {
            id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            address: user.address,
            city: user.city,
            zip_code: user.zip_code,
            role: user.role,
            enabled: user.enabled,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.users.insert(id, row.clone());
        Ok(row)
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryTransaction {
    async fn insert_category(&mut self, category: NewCategory) -> Result<Category> {
        if self
            .working
            .categories
            .values()
            .any(|c| c.name == category.name)
        {
            return Err(StoreError::UniqueViolation("categories_name_key".into()));
        }
        let id = CategoryId::new(self.working.next_id());
        let row = Category {
            id,
            name: category.name,
            description: category.description,
            active: category.active,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.categories.insert(id, row.clone());
        Ok(row)
    }

    async fn find_category(&mut self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn find_category_by_name(&mut self, name: &str) -> Result<Option<Category>> {
        Ok(self
            .working
            .categories
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn list_active_categories(&mut self) -> Result<Vec<Category>> {
        let mut categories: Vec<_> = self
            .working
            .categories
            .values()
            .filter(|c| c.active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl ProductRepository for InMemoryTransaction {
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        if !self.working.categories.contains_key(&product.category_id) {
            return Err(StoreError::NotFound(format!(
                "category {}",
                product.category_id
            )));
        }
        let id = ProductId::new(self.working.next_id());
        let row = Product {
            id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock_quantity: product.stock_quantity,
            image_url: product.image_url,
            brand: product.brand,
            category_id: product.category_id,
            active: product.active,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.products.insert(id, row.clone());
        Ok(row)
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn list_active_products(&mut self, page: PageRequest) -> Result<Page<Product>> {
        let products = self
            .working
            .products
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect();
        Ok(paginate(products, page))
    }

    async fn search_active_products(
        &mut self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        let needle = query.to_lowercase();
        let products = self
            .working
            .products
            .values()
            .filter(|p| p.active)
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        Ok(paginate(products, page))
    }

    async fn decrease_stock(&mut self, id: ProductId, quantity: i32) -> Result<Product> {
        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;

        if product.stock_quantity < quantity {
            return Err(StoreError::InsufficientStock {
                product_id: id,
                requested: quantity,
                available: product.stock_quantity,
            });
        }

        product.stock_quantity -= quantity;
        product.updated_at = Some(Utc::now());
        Ok(product.clone())
    }
}

#[async_trait]
impl CartRepository for InMemoryTransaction {
    async fn find_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self
            .working
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn find_or_create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        if let Some(cart) = self.find_cart_by_user(user_id).await? {
            return Ok(cart);
        }
        if !self.working.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        let id = CartId::new(self.working.next_id());
        let cart = Cart {
            id,
            user_id,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.carts.insert(id, cart.clone());
        Ok(cart)
    }

    async fn list_cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>> {
        self.working
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .map(|item| {
                let product = self
                    .working
                    .products
                    .get(&item.product_id)
                    .cloned()
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!("cart item {} has no product", item.id))
                    })?;
                Ok(CartLine {
                    item: item.clone(),
                    product,
                })
            })
            .collect()
    }

    async fn upsert_cart_item(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem> {
        if !self.working.products.contains_key(&product_id) {
            return Err(StoreError::NotFound(format!("product {product_id}")));
        }
        let now = Utc::now();
        if let Some(cart) = self.working.carts.get_mut(&cart_id) {
            cart.updated_at = Some(now);
        }

        if let Some(item) = self
            .working
            .cart_items
            .values_mut()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
        {
            item.quantity = item.quantity.checked_add(quantity).ok_or_else(|| {
                StoreError::OutOfRange(format!("quantity of product {product_id} in cart {cart_id}"))
            })?;
            item.updated_at = Some(now);
            return Ok(item.clone());
        }

        let id = CartItemId::new(self.working.next_id());
        let item = CartItem {
            id,
            cart_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: None,
        };
        self.working.cart_items.insert(id, item.clone());
        Ok(item)
    }

    async fn delete_cart_item(&mut self, cart_id: CartId, product_id: ProductId) -> Result<bool> {
        let before = self.working.cart_items.len();
        self.working
            .cart_items
            .retain(|_, i| !(i.cart_id == cart_id && i.product_id == product_id));
        Ok(self.working.cart_items.len() < before)
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let before = self.working.cart_items.len();
        self.working.cart_items.retain(|_, i| i.cart_id != cart_id);
        if let Some(cart) = self.working.carts.get_mut(&cart_id) {
            cart.updated_at = Some(Utc::now());
        }
        Ok((before - self.working.cart_items.len()) as u64)
    }
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        if self
            .working
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::UniqueViolation("orders_order_number_key".into()));
        }
        let id = OrderId::new(self.working.next_id());
        let row = Order {
            id,
            order_number: order.order_number,
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address,
            notes: order.notes,
            created_at: order.created_at,
            updated_at: None,
        };
        self.working.orders.insert(id, row.clone());
        Ok(row)
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        if self.faults.fail_on_order_item_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("order item insert failed".into()));
        }
        if !self.working.orders.contains_key(&item.order_id) {
            return Err(StoreError::NotFound(format!("order {}", item.order_id)));
        }
        let id = OrderItemId::new(self.working.next_id());
        let row = OrderItem {
            id,
            order_id: item.order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        };
        self.working.order_items.insert(id, row.clone());
        Ok(row)
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn list_order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        Ok(self
            .working
            .order_items
            .values()
            .filter(|i| i.order_id == order_id)
            .map(|item| OrderLine {
                product_name: self
                    .working
                    .products
                    .get(&item.product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                item: item.clone(),
            })
            .collect())
    }

    async fn list_user_orders(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let mut orders: Vec<_> = self
            .working
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn count_user_orders_between(
        &mut self,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64> {
        if self.faults.fail_on_order_count.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("order count failed".into()));
        }
        Ok(self
            .working
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.created_at >= from && o.created_at <= to)
            .count() as i64)
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool> {
        let existed = self.working.orders.remove(&id).is_some();
        self.working.order_items.retain(|_, i| i.order_id != id);
        Ok(existed)
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        if self.faults.degraded.load(Ordering::SeqCst) {
            tracing::warn!("degraded store: rollback keeps transaction writes");
            return self.commit().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OrderStatus, Role};
    use common::Money;

    async fn seed(store: &InMemoryStore) -> (User, Product) {
        let mut tx = store.begin().await.unwrap();
        let user = tx
            .insert_user(NewUser {
                email: "mario.rossi@example.com".into(),
                password_hash: "hash".into(),
                first_name: "Mario".into(),
                last_name: "Rossi".into(),
                phone: None,
                address: None,
                city: None,
                zip_code: None,
                role: Role::User,
                enabled: true,
            })
            .await
            .unwrap();
        let category = tx
            .insert_category(NewCategory {
                name: "Casa".into(),
                description: None,
                active: true,
            })
            .await
            .unwrap();
        let product = tx
            .insert_product(NewProduct {
                name: "Lampada".into(),
                description: Some("Lampada da tavolo".into()),
                price: Money::from_cents(2500),
                stock_quantity: 5,
                image_url: None,
                brand: None,
                category_id: category.id,
                active: true,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (user, product)
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = InMemoryStore::new();
        let (user, _) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        tx.find_or_create_cart(user.id).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_cart_by_user(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dropped_transaction_releases_the_store() {
        let store = InMemoryStore::new();
        {
            let _tx = store.begin().await.unwrap();
        }
        let tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn degraded_rollback_keeps_writes() {
        let store = InMemoryStore::degraded();
        let (user, _) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        tx.find_or_create_cart(user.id).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_cart_by_user(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn decrease_stock_refuses_to_go_negative() {
        let store = InMemoryStore::new();
        let (_, product) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        let updated = tx.decrease_stock(product.id, 5).await.unwrap();
        assert_eq!(updated.stock_quantity, 0);

        let err = tx.decrease_stock(product.id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 1,
                available: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn upsert_sums_quantity_for_same_product() {
        let store = InMemoryStore::new();
        let (user, product) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        let cart = tx.find_or_create_cart(user.id).await.unwrap();
        tx.upsert_cart_item(cart.id, product.id, 1).await.unwrap();
        let item = tx.upsert_cart_item(cart.id, product.id, 2).await.unwrap();
        assert_eq!(item.quantity, 3);

        let lines = tx.list_cart_lines(cart.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product.name, "Lampada");
    }

    #[tokio::test]
    async fn upsert_refuses_quantity_overflow() {
        let store = InMemoryStore::new();
        let (user, product) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        let cart = tx.find_or_create_cart(user.id).await.unwrap();
        tx.upsert_cart_item(cart.id, product.id, 2_000_000_000)
            .await
            .unwrap();
        let err = tx
            .upsert_cart_item(cart.id, product.id, 2_000_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange(_)));

        let lines = tx.list_cart_lines(cart.id).await.unwrap();
        assert_eq!(lines[0].item.quantity, 2_000_000_000);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = InMemoryStore::new();
        let (user, _) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_user(NewUser {
                email: user.email.clone(),
                password_hash: "x".into(),
                first_name: "A".into(),
                last_name: "B".into(),
                phone: None,
                address: None,
                city: None,
                zip_code: None,
                role: Role::User,
                enabled: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn order_count_window_is_inclusive() {
        let store = InMemoryStore::new();
        let (user, _) = seed(&store).await;
        let at = Utc::now();

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(NewOrder {
            order_number: "ORD-1-AAAAAAAA".into(),
            user_id: user.id,
            status: OrderStatus::Pending,
            total_amount: Money::from_cents(100),
            shipping_address: "Via Roma 1".into(),
            notes: None,
            created_at: at,
        })
        .await
        .unwrap();

        assert_eq!(tx.count_user_orders_between(user.id, at, at).await.unwrap(), 1);
        let later = at + chrono::Duration::nanoseconds(1);
        let count = tx
            .count_user_orders_between(user.id, later, later + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(count, 0);

        store.set_fail_on_order_count(true);
        assert!(tx.count_user_orders_between(user.id, at, at).await.is_err());
    }

    #[tokio::test]
    async fn search_matches_description_ignoring_case() {
        let store = InMemoryStore::new();
        seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        let page = tx
            .search_active_products("TAVOLO", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_elements, 1);

        let none = tx
            .search_active_products("sedia", PageRequest::default())
            .await
            .unwrap();
        assert!(none.items.is_empty());
    }
}
