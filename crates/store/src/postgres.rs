use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, CategoryId, Money, OrderId, OrderItemId, ProductId, UserId};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    Cart, CartItem, CartLine, CartRepository, Category, CategoryRepository, NewCategory, NewOrder,
    NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderLine, OrderRepository, Page,
    PageRequest, Product, ProductRepository, Result, Store, StoreError, Transaction, User,
    UserRepository,
};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, address, \
     city, zip_code, role, enabled, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, description, active, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock_quantity, image_url, brand, \
     category_id, active, created_at, updated_at";

const CART_COLUMNS: &str = "id, user_id, created_at, updated_at";

const CART_ITEM_COLUMNS: &str = "id, cart_id, product_id, quantity, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, total_amount, shipping_address, \
     notes, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price, total_price";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// An open transaction on a [`PostgresStore`].
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Maps unique-constraint failures to [`StoreError::UniqueViolation`] and
/// numeric overflow to [`StoreError::OutOfRange`].
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(
                db_err.constraint().unwrap_or("unique").to_string(),
            );
        }
        if db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) {
            return StoreError::OutOfRange(db_err.message().to_string());
        }
    }
    StoreError::Database(e)
}

fn money(row: &PgRow, column: &str) -> Result<Money> {
    Ok(Money::new(row.try_get::<Decimal, _>(column)?))
}

fn row_to_user(row: PgRow) -> Result<User> {
    Ok(User {
        id: UserId::new(row.try_get("id")?),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        zip_code: row.try_get("zip_code")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_category(row: PgRow) -> Result<Category> {
    Ok(Category {
        id: CategoryId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: money(row, "price")?,
        stock_quantity: row.try_get("stock_quantity")?,
        image_url: row.try_get("image_url")?,
        brand: row.try_get("brand")?,
        category_id: CategoryId::new(row.try_get("category_id")?),
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart(row: PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::new(row.try_get("id")?),
        cart_id: CartId::new(row.try_get("cart_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Cart item columns are aliased with an `item_` prefix in the join.
fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
    let item = CartItem {
        id: CartItemId::new(row.try_get("item_id")?),
        cart_id: CartId::new(row.try_get("item_cart_id")?),
        product_id: ProductId::new(row.try_get("item_product_id")?),
        quantity: row.try_get("item_quantity")?,
        created_at: row.try_get("item_created_at")?,
        updated_at: row.try_get("item_updated_at")?,
    };
    Ok(CartLine {
        item,
        product: row_to_product(&row)?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        order_number: row.try_get("order_number")?,
        user_id: UserId::new(row.try_get("user_id")?),
        status: row.try_get::<String, _>("status")?.parse()?,
        total_amount: money(&row, "total_amount")?,
        shipping_address: row.try_get("shipping_address")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
        unit_price: money(row, "unit_price")?,
        total_price: money(row, "total_price")?,
    })
}

/// Escapes `LIKE` wildcards so the query is matched literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl PostgresTransaction {
    async fn product_page(
        &mut self,
        filter: &str,
        pattern: Option<String>,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        let count_sql = format!("SELECT COUNT(*) FROM products WHERE {filter}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(ref p) = pattern {
            count_query = count_query.bind(p);
        }
        let total: i64 = count_query.fetch_one(&mut *self.tx).await?;

        let (limit_param, offset_param) = if pattern.is_some() { (2, 3) } else { (1, 2) };
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {filter} \
             ORDER BY id ASC LIMIT ${limit_param} OFFSET ${offset_param}"
        );
        let mut query = sqlx::query(&sql);
        if let Some(p) = pattern {
            query = query.bind(p);
        }
        let rows = query
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(Page {
            items: rows.iter().map(row_to_product).collect::<Result<_>>()?,
            request: page,
            total_elements: total.max(0) as u64,
        })
    }
}

#[async_trait]
impl UserRepository for PostgresTransaction {
    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, phone, address, \
             city, zip_code, role, enabled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone)
            .bind(&user.address)
            .bind(&user.city)
            .bind(&user.zip_code)
            .bind(user.role.as_str())
            .bind(user.enabled)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        row_to_user(row)
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_user).transpose()
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_user).transpose()
    }
}

#[async_trait]
impl CategoryRepository for PostgresTransaction {
    async fn insert_category(&mut self, category: NewCategory) -> Result<Category> {
        let sql = format!(
            "INSERT INTO categories (name, description, active) VALUES ($1, $2, $3) \
             RETURNING {CATEGORY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&category.name)
            .bind(&category.description)
            .bind(category.active)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        row_to_category(row)
    }

    async fn find_category(&mut self, id: CategoryId) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_category).transpose()
    }

    async fn find_category_by_name(&mut self, name: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_category).transpose()
    }

    async fn list_active_categories(&mut self) -> Result<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE active ORDER BY name");
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        rows.into_iter().map(row_to_category).collect()
    }
}

#[async_trait]
impl ProductRepository for PostgresTransaction {
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let sql = format!(
            "INSERT INTO products (name, description, price, stock_quantity, image_url, brand, \
             category_id, active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price.amount())
            .bind(product.stock_quantity)
            .bind(&product.image_url)
            .bind(&product.brand)
            .bind(product.category_id.as_i64())
            .bind(product.active)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        row_to_product(&row)
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_active_products(&mut self, page: PageRequest) -> Result<Page<Product>> {
        self.product_page("active", None, page).await
    }

    async fn search_active_products(
        &mut self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        self.product_page(
            "active AND (name ILIKE $1 OR description ILIKE $1)",
            Some(like_pattern(query)),
            page,
        )
        .await
    }

    async fn decrease_stock(&mut self, id: ProductId, quantity: i32) -> Result<Product> {
        // The conditional update takes the row lock, so concurrent orders on
        // the same product queue here and re-check the predicate.
        let sql = format!(
            "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = NOW() \
             WHERE id = $1 AND stock_quantity >= $2 RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(quantity)
            .fetch_optional(&mut *self.tx)
            .await?;

        if let Some(row) = row {
            return row_to_product(&row);
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
                .bind(id.as_i64())
                .fetch_optional(&mut *self.tx)
                .await?;

        match available {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id: id,
                requested: quantity,
                available,
            }),
            None => Err(StoreError::NotFound(format!("product {id}"))),
        }
    }
}

#[async_trait]
impl CartRepository for PostgresTransaction {
    async fn find_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1");
        let row = sqlx::query(&sql)
            .bind(user_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_cart).transpose()
    }

    async fn find_or_create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        let sql = format!(
            "INSERT INTO carts (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING {CART_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_i64())
            .fetch_one(&mut *self.tx)
            .await?;
        row_to_cart(row)
    }

    async fn list_cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT ci.id AS item_id, ci.cart_id AS item_cart_id, ci.product_id AS item_product_id,
                   ci.quantity AS item_quantity, ci.created_at AS item_created_at,
                   ci.updated_at AS item_updated_at,
                   p.id, p.name, p.description, p.price, p.stock_quantity, p.image_url, p.brand,
                   p.category_id, p.active, p.created_at, p.updated_at
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.id ASC
            "#,
        )
        .bind(cart_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_cart_line).collect()
    }

    async fn upsert_cart_item(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem> {
        let sql = format!(
            "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (cart_id, product_id) DO UPDATE \
             SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW() \
             RETURNING {CART_ITEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(cart_id.as_i64())
            .bind(product_id.as_i64())
            .bind(quantity)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_write_error)?;

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        row_to_cart_item(row)
    }

    async fn delete_cart_item(&mut self, cart_id: CartId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id.as_i64())
            .bind(product_id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderRepository for PostgresTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let sql = format!(
            "INSERT INTO orders (order_number, user_id, status, total_amount, shipping_address, \
             notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&order.order_number)
            .bind(order.user_id.as_i64())
            .bind(order.status.as_str())
            .bind(order.total_amount.amount())
            .bind(&order.shipping_address)
            .bind(&order.notes)
            .bind(order.created_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        row_to_order(row)
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        let sql = format!(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price, total_price) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_ITEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(item.order_id.as_i64())
            .bind(item.product_id.as_i64())
            .bind(item.quantity)
            .bind(item.unit_price.amount())
            .bind(item.total_price.amount())
            .fetch_one(&mut *self.tx)
            .await?;
        row_to_order_item(&row)
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_order).transpose()
    }

    async fn list_order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.unit_price, oi.total_price,
                   p.name AS product_name
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id ASC
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderLine {
                    item: row_to_order_item(row)?,
                    product_name: row.try_get("product_name")?,
                })
            })
            .collect()
    }

    async fn list_user_orders(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_i64())
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(row_to_order).collect()
    }

    async fn count_user_orders_between(
        &mut self,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64> {
        sqlx::query("SAVEPOINT order_count")
            .execute(&mut *self.tx)
            .await?;

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND created_at >= $2 AND created_at <= $3",
        )
        .bind(user_id.as_i64())
        .bind(from)
        .bind(to)
        .fetch_one(&mut *self.tx)
        .await;

        match count {
            Ok(count) => {
                sqlx::query("RELEASE SAVEPOINT order_count")
                    .execute(&mut *self.tx)
                    .await?;
                Ok(count)
            }
            Err(e) => {
                sqlx::query("ROLLBACK TO SAVEPOINT order_count")
                    .execute(&mut *self.tx)
                    .await?;
                Err(e.into())
            }
        }
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
