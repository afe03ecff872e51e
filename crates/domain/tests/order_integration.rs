//! Integration tests for order placement.
//!
//! These tests drive the create-order command end to end against the
//! in-memory store: validation, persistence, stock, cart and events.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use common::{Money, ProductId, UserId};
use domain::{
    BusinessCalendar, CartItemRequest, CartService, Clock, CreateOrderRequest, FixedClock,
    InMemoryEventPublisher, OrderCommand, OrderPolicy, OrderService, OrderValidator, ShopError,
    ValidatorChain, ValidatorError,
};
use store::{
    CartLine, InMemoryStore, NewCategory, NewOrder, NewProduct, NewUser, OrderStatus, Role, Store,
    Transaction,
};

struct Shop {
    store: InMemoryStore,
    clock: Arc<FixedClock>,
    events: Arc<InMemoryEventPublisher>,
    orders: OrderService,
    carts: CartService,
    user_id: UserId,
}

impl Shop {
    async fn new() -> Self {
        Self::with_store(InMemoryStore::new(), |chain| chain).await
    }

    async fn with_store(
        store: InMemoryStore,
        customize: impl FnOnce(ValidatorChain) -> ValidatorChain,
    ) -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
        ));
        let policy = OrderPolicy {
            calendar: BusinessCalendar::utc(),
            ..OrderPolicy::default()
        };
        let chain = customize(ValidatorChain::standard(&policy, clock.clone()));
        Self::build(store, clock, chain).await
    }

    async fn build(store: InMemoryStore, clock: Arc<FixedClock>, chain: ValidatorChain) -> Self {
        let events = Arc::new(InMemoryEventPublisher::new());
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let orders = OrderService::new(shared.clone(), chain, events.clone(), clock.clone());
        let carts = CartService::new(shared);

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
        tx.insert_category(NewCategory {
            name: "Casa".into(),
            description: None,
            active: true,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        Self {
            store,
            clock,
            events,
            orders,
            carts,
            user_id: user.id,
        }
    }

    async fn product(&self, name: &str, price_cents: i64, stock: i32, active: bool) -> ProductId {
        self.product_priced(name, Money::from_cents(price_cents), stock, active)
            .await
    }

    async fn product_priced(&self, name: &str, price: Money, stock: i32, active: bool) -> ProductId {
        let mut tx = self.store.begin().await.unwrap();
        let category = tx.find_category_by_name("Casa").await.unwrap().unwrap();
        let product = tx
            .insert_product(NewProduct {
                name: name.into(),
                description: None,
                price,
                stock_quantity: stock,
                image_url: None,
                brand: None,
                category_id: category.id,
                active,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        product.id
    }

    /// Puts a line in the cart without the cart service's stock check.
    async fn put_in_cart(&self, product_id: ProductId, quantity: i32) {
        let mut tx = self.store.begin().await.unwrap();
        let cart = tx.find_or_create_cart(self.user_id).await.unwrap();
        tx.upsert_cart_item(cart.id, product_id, quantity)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    async fn stock(&self, product_id: ProductId) -> i32 {
        let mut tx = self.store.begin().await.unwrap();
        let product = tx.find_product(product_id).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        product.stock_quantity
    }

    async fn cart_lines(&self) -> Vec<CartLine> {
        let mut tx = self.store.begin().await.unwrap();
        let lines = match tx.find_cart_by_user(self.user_id).await.unwrap() {
            Some(cart) => tx.list_cart_lines(cart.id).await.unwrap(),
            None => Vec::new(),
        };
        tx.commit().await.unwrap();
        lines
    }

    async fn seed_orders_today(&self, count: usize) {
        let mut tx = self.store.begin().await.unwrap();
        for i in 0..count {
            tx.insert_order(NewOrder {
                order_number: format!("ORD-SEED-{i}"),
                user_id: self.user_id,
                status: OrderStatus::Pending,
                total_amount: Money::from_cents(1000),
                shipping_address: "Via Roma 1, Milano".into(),
                notes: None,
                created_at: self.clock.now() - Duration::hours(1),
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();
    }

    async fn place(&self) -> domain::Result<domain::OrderView> {
        self.orders
            .create_order(self.user_id, CreateOrderRequest::new("Via Roma 1, Milano"))
            .await
    }
}

fn business_message(result: domain::Result<domain::OrderView>) -> String {
    match result {
        Err(ShopError::Business(message)) => message,
        other => panic!("expected business failure, got {other:?}"),
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn happy_path() {
        let shop = Shop::new().await;
        let a = shop.product("Lampada", 10_000, 10, true).await;
        shop.put_in_cart(a, 3).await;

        let order = shop.place().await.unwrap();

        let (prefix, rest) = order.order_number.split_at(4);
        assert_eq!(prefix, "ORD-");
        let (millis, suffix) = rest.split_once('-').unwrap();
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, Money::from_cents(30_000));
        assert_eq!(order.items.len(), 1);
        let item = &order.items[0];
        assert_eq!(item.product_id, a);
        assert_eq!(item.quantity, 3);
        assert_eq!(item.unit_price, Money::from_cents(10_000));
        assert_eq!(item.total_price, Money::from_cents(30_000));

        assert_eq!(shop.stock(a).await, 7);
        assert!(shop.cart_lines().await.is_empty());

        let created = shop.events.order_created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].order_id, order.id);
        assert_eq!(created[0].order_number, order.order_number);
        assert_eq!(created[0].user_email, "mario.rossi@example.com");
    }

    #[tokio::test]
    async fn price_limit_rejects_large_orders() {
        let shop = Shop::new().await;
        let b = shop.product("Divano", 600_000, 10, true).await;
        shop.put_in_cart(b, 1).await;

        let message = business_message(shop.place().await);
        assert!(message.contains("grande (€6000.00)"), "{message}");
        assert!(message.contains("€5000.00"), "{message}");

        assert_eq!(shop.stock(b).await, 10);
        assert_eq!(shop.cart_lines().await.len(), 1);
        assert!(shop.events.published().is_empty());
    }

    #[tokio::test]
    async fn stock_shortage_is_rejected() {
        let shop = Shop::new().await;
        let c = shop.product("Sedia", 4_000, 2, true).await;
        shop.put_in_cart(c, 5).await;

        let message = business_message(shop.place().await);
        assert!(
            message.contains("richiesti 5 pezzi ma disponibili solo 2"),
            "{message}"
        );
        assert_eq!(shop.stock(c).await, 2);
        assert_eq!(shop.cart_lines().await[0].item.quantity, 5);
    }

    #[tokio::test]
    async fn inactive_product_is_rejected() {
        let shop = Shop::new().await;
        let d = shop.product("Vaso", 1_500, 50, false).await;
        shop.put_in_cart(d, 1).await;

        let message = business_message(shop.place().await);
        assert!(message.contains("non è più disponibile"), "{message}");
    }

    #[tokio::test]
    async fn daily_limit_is_enforced() {
        let shop = Shop::new().await;
        let p = shop.product("Tazza", 800, 10, true).await;
        shop.put_in_cart(p, 1).await;
        shop.seed_orders_today(10).await;

        let message = business_message(shop.place().await);
        assert!(message.contains("10 ordini al giorno"), "{message}");
        assert_eq!(shop.store.order_count().await, 10);
    }

    struct AlwaysRejects;

    #[async_trait]
    impl OrderValidator for AlwaysRejects {
        fn name(&self) -> &str {
            "AlwaysRejects"
        }

        fn order(&self) -> i32 {
            5
        }

        async fn validate(
            &self,
            _tx: &mut dyn Transaction,
            _user_id: UserId,
            _lines: &[CartLine],
        ) -> Result<(), ValidatorError> {
            Err(ValidatorError::rejected("first"))
        }
    }

    struct Explodes(Arc<AtomicUsize>);

    #[async_trait]
    impl OrderValidator for Explodes {
        fn name(&self) -> &str {
            "Explodes"
        }

        fn order(&self) -> i32 {
            50
        }

        async fn validate(
            &self,
            _tx: &mut dyn Transaction,
            _user_id: UserId,
            _lines: &[CartLine],
        ) -> Result<(), ValidatorError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ValidatorError::Failed("boom".into()))
        }
    }

    #[tokio::test]
    async fn first_rejection_halts_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain_calls = calls.clone();
        let shop = Shop::with_store(InMemoryStore::new(), move |chain| {
            chain.with(Explodes(chain_calls)).with(AlwaysRejects)
        })
        .await;
        let p = shop.product("Tazza", 800, 10, true).await;
        shop.put_in_cart(p, 1).await;

        assert_eq!(business_message(shop.place().await), "first");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

mod boundaries {
    use super::*;

    #[tokio::test]
    async fn empty_cart_is_a_business_failure() {
        let shop = Shop::new().await;
        let p = shop.product("Tazza", 800, 10, true).await;
        shop.put_in_cart(p, 1).await;
        shop.carts.clear_cart(shop.user_id).await.unwrap();

        let message = business_message(shop.place().await);
        assert!(message.contains("vuoto"), "{message}");
    }

    #[tokio::test]
    async fn missing_cart_is_reported() {
        let shop = Shop::new().await;
        let err = shop.place().await.unwrap_err();
        assert!(matches!(err, ShopError::InvalidInput(ref m) if m.contains("Carrello")));
    }

    #[tokio::test]
    async fn total_equal_to_limit_passes() {
        let shop = Shop::new().await;
        let p = shop.product("Divano", 250_000, 10, true).await;
        shop.put_in_cart(p, 2).await;

        let order = shop.place().await.unwrap();
        assert_eq!(order.total_amount, Money::from_cents(500_000));
    }

    #[tokio::test]
    async fn one_cent_over_limit_fails() {
        let shop = Shop::new().await;
        let a = shop.product("Divano", 250_000, 10, true).await;
        let b = shop.product("Penna", 1, 10, true).await;
        shop.put_in_cart(a, 2).await;
        shop.put_in_cart(b, 1).await;

        let message = business_message(shop.place().await);
        assert!(message.contains("limite"), "{message}");
    }

    #[tokio::test]
    async fn quantity_equal_to_stock_passes() {
        let shop = Shop::new().await;
        let p = shop.product("Sedia", 4_000, 4, true).await;
        shop.put_in_cart(p, 4).await;

        shop.place().await.unwrap();
        assert_eq!(shop.stock(p).await, 0);
    }

    #[tokio::test]
    async fn ninety_nine_passes_one_hundred_fails() {
        let shop = Shop::new().await;
        let p = shop.product("Bullone", 1, 500, true).await;
        shop.put_in_cart(p, 99).await;
        shop.place().await.unwrap();

        shop.put_in_cart(p, 100).await;
        let message = business_message(shop.place().await);
        assert!(message.contains("Massimo"), "{message}");
        assert_eq!(shop.stock(p).await, 401);
    }

    #[tokio::test]
    async fn one_below_daily_limit_passes() {
        let shop = Shop::new().await;
        let p = shop.product("Tazza", 800, 10, true).await;
        shop.put_in_cart(p, 1).await;
        shop.seed_orders_today(9).await;

        shop.place().await.unwrap();
        assert_eq!(shop.store.order_count().await, 10);
    }

    #[tokio::test]
    async fn yesterdays_orders_do_not_count() {
        let shop = Shop::new().await;
        let p = shop.product("Tazza", 800, 10, true).await;
        shop.put_in_cart(p, 1).await;
        shop.seed_orders_today(10).await;
        shop.clock.advance(Duration::days(1));

        shop.place().await.unwrap();
    }

    #[tokio::test]
    async fn disabled_validators_are_skipped() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let policy = OrderPolicy {
            disabled_validators: vec!["pricelimit".into()],
            calendar: BusinessCalendar::utc(),
            ..OrderPolicy::default()
        };
        let chain = ValidatorChain::standard(&policy, clock.clone());
        let shop = Shop::build(InMemoryStore::new(), clock, chain).await;
        let p = shop.product("Divano", 600_000, 10, true).await;
        shop.put_in_cart(p, 1).await;

        let order = shop.place().await.unwrap();
        assert_eq!(order.total_amount, Money::from_cents(600_000));
    }

    #[tokio::test]
    async fn blank_shipping_address_fails_validation() {
        let shop = Shop::new().await;
        let err = shop
            .orders
            .create_order(shop.user_id, CreateOrderRequest::new("   "))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShopError::Validation(ref m) if m == &["Indirizzo di spedizione è obbligatorio"]
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let shop = Shop::new().await;
        let err = shop
            .orders
            .create_order(UserId::new(9_999), CreateOrderRequest::new("Via Roma 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::InvalidInput(ref m) if m == "Utente non trovato"));
    }
}

mod invariants {
    use super::*;

    #[tokio::test]
    async fn totals_stock_and_cart_hold_for_multi_line_orders() {
        let shop = Shop::new().await;
        let a = shop.product("Piatto", 1_299, 20, true).await;
        let b = shop.product("Bicchiere", 350, 30, true).await;
        shop.put_in_cart(a, 4).await;
        shop.put_in_cart(b, 6).await;

        let order = shop.place().await.unwrap();

        for item in &order.items {
            assert_eq!(Some(item.total_price), item.unit_price.times(item.quantity));
        }
        let sum = Money::checked_sum(order.items.iter().map(|i| i.total_price)).unwrap();
        assert_eq!(order.total_amount, sum);
        assert_eq!(order.total_amount, Money::from_cents(4 * 1_299 + 6 * 350));

        assert_eq!(shop.stock(a).await, 16);
        assert_eq!(shop.stock(b).await, 24);

        assert!(shop.cart_lines().await.is_empty());
        let cart = shop.carts.get_cart(shop.user_id).await.unwrap();
        assert_eq!(cart.total_items, 0);
    }

    #[tokio::test]
    async fn order_numbers_are_unique() {
        let shop = Shop::new().await;
        let p = shop.product("Matita", 50, 100, true).await;

        let mut numbers = Vec::new();
        for _ in 0..5 {
            shop.put_in_cart(p, 1).await;
            numbers.push(shop.place().await.unwrap().order_number);
        }
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 5);
        assert_eq!(shop.events.order_created().len(), 5);
    }

    #[tokio::test]
    async fn failed_orders_publish_nothing() {
        let shop = Shop::new().await;
        let p = shop.product("Sedia", 4_000, 1, true).await;
        shop.put_in_cart(p, 2).await;

        assert!(shop.place().await.is_err());
        assert!(shop.events.published().is_empty());
        assert_eq!(shop.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn placed_order_reads_back_unchanged() {
        let shop = Shop::new().await;
        let p = shop.product("Cuscino", 2_450, 10, true).await;
        shop.put_in_cart(p, 2).await;

        let order = shop
            .orders
            .create_order(
                shop.user_id,
                CreateOrderRequest::new("Via Roma 1, Milano").with_notes("Citofono 3"),
            )
            .await
            .unwrap();

        let found = shop.orders.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(found, order);
        assert_eq!(found.notes.as_deref(), Some("Citofono 3"));
        assert_eq!(found.items[0].product_name, "Cuscino");
    }

    #[tokio::test]
    async fn user_orders_are_newest_first() {
        let shop = Shop::new().await;
        let p = shop.product("Matita", 50, 100, true).await;

        shop.put_in_cart(p, 1).await;
        let first = shop.place().await.unwrap();
        shop.clock.advance(Duration::minutes(5));
        shop.put_in_cart(p, 1).await;
        let second = shop.place().await.unwrap();

        let ids: Vec<_> = shop
            .orders
            .get_user_orders(shop.user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn unknown_order_is_none() {
        let shop = Shop::new().await;
        let missing = shop.orders.find_by_id(common::OrderId::new(404)).await.unwrap();
        assert!(missing.is_none());
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn daily_limit_storage_errors_are_swallowed() {
        let store = InMemoryStore::new();
        store.set_fail_on_order_count(true);
        let shop = Shop::with_store(store, |chain| chain).await;
        let p = shop.product("Tazza", 800, 10, true).await;
        shop.put_in_cart(p, 1).await;

        shop.place().await.unwrap();
    }

    #[tokio::test]
    async fn item_failure_leaves_no_order_behind() {
        let store = InMemoryStore::new();
        store.set_fail_on_order_item_insert(true);
        let shop = Shop::with_store(store, |chain| chain).await;
        let p = shop.product("Tazza", 800, 10, true).await;
        shop.put_in_cart(p, 2).await;

        let err = shop.place().await.unwrap_err();
        assert!(matches!(err, ShopError::Store(_)));
        assert_eq!(shop.store.order_count().await, 0);
        assert_eq!(shop.stock(p).await, 10);
        assert_eq!(shop.cart_lines().await.len(), 1);
        assert!(shop.events.published().is_empty());
    }

    #[tokio::test]
    async fn compensation_removes_order_when_rollback_is_not_atomic() {
        let store = InMemoryStore::degraded();
        store.set_fail_on_order_item_insert(true);
        let shop = Shop::with_store(store, |chain| chain).await;
        let p = shop.product("Tazza", 800, 10, true).await;
        shop.put_in_cart(p, 1).await;

        let mut command = shop
            .orders
            .init(shop.user_id, CreateOrderRequest::new("Via Roma 1"));
        assert!(command.execute().await.is_err());

        assert!(command.created_order().is_none());
        assert_eq!(shop.store.order_count().await, 0);
        assert_eq!(shop.store.order_item_count().await, 0);
        assert!(shop.events.published().is_empty());
    }

    #[tokio::test]
    async fn stock_drop_after_validation_rolls_everything_back() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
        ));
        let policy = OrderPolicy {
            disabled_validators: vec!["Stock".into()],
            calendar: BusinessCalendar::utc(),
            ..OrderPolicy::default()
        };
        let chain = ValidatorChain::standard(&policy, clock.clone());
        let shop = Shop::build(InMemoryStore::new(), clock, chain).await;
        let lamp = shop.product("Lampada", 1_000, 10, true).await;
        let cushion = shop.product("Cuscino", 500, 2, true).await;
        shop.put_in_cart(lamp, 1).await;
        shop.put_in_cart(cushion, 5).await;

        let err = shop.place().await.unwrap_err();

        assert!(matches!(
            err,
            ShopError::InvalidInput(ref m) if m == "Stock insufficiente per 'Cuscino'"
        ));
        assert_eq!(shop.stock(lamp).await, 10);
        assert_eq!(shop.stock(cushion).await, 2);
        assert_eq!(shop.store.order_count().await, 0);
        assert_eq!(shop.store.order_item_count().await, 0);
        assert_eq!(shop.cart_lines().await.len(), 2);
        assert!(shop.events.published().is_empty());
    }

    #[tokio::test]
    async fn oversized_line_total_fails_without_panicking() {
        let shop = Shop::new().await;
        let price: Money = "50000000000000000000000000000".parse().unwrap();
        let yacht = shop.product_priced("Yacht", price, 10, true).await;
        shop.put_in_cart(yacht, 2).await;

        let err = shop.place().await.unwrap_err();
        assert!(matches!(err, ShopError::Business(ref m) if m.starts_with("Ordine troppo grande.")));
        assert_eq!(shop.stock(yacht).await, 10);
        assert_eq!(shop.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn rollback_without_execution_is_a_no_op() {
        let shop = Shop::new().await;
        let mut command = shop
            .orders
            .init(shop.user_id, CreateOrderRequest::new("Via Roma 1"));
        command.rollback().await;
        assert_eq!(shop.store.order_count().await, 0);
    }
}

mod cart {
    use super::*;

    #[tokio::test]
    async fn adding_twice_sums_quantities() {
        let shop = Shop::new().await;
        let p = shop.product("Tazza", 800, 10, true).await;

        shop.carts
            .add_to_cart(shop.user_id, CartItemRequest::new(p, 2))
            .await
            .unwrap();
        let cart = shop
            .carts
            .add_to_cart(shop.user_id, CartItemRequest::new(p, 3))
            .await
            .unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
        assert_eq!(cart.total_items, 5);
        assert_eq!(cart.total_amount, Money::from_cents(4_000));
    }

    #[tokio::test]
    async fn add_rejects_more_than_stock() {
        let shop = Shop::new().await;
        let p = shop.product("Tazza", 800, 2, true).await;

        let err = shop
            .carts
            .add_to_cart(shop.user_id, CartItemRequest::new(p, 3))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Quantità non disponibile");
    }

    #[tokio::test]
    async fn missing_entities_are_reported() {
        let shop = Shop::new().await;
        let p = shop.product("Tazza", 800, 10, true).await;

        let err = shop.carts.get_cart(shop.user_id).await.unwrap_err();
        assert_eq!(err.to_string(), "Carrello non trovato");

        let err = shop
            .carts
            .add_to_cart(shop.user_id, CartItemRequest::new(ProductId::new(9_999), 1))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Prodotto non trovato");

        let err = shop
            .carts
            .add_to_cart(UserId::new(9_999), CartItemRequest::new(p, 1))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Utente non trovato");
    }

    #[tokio::test]
    async fn remove_reports_absent_product() {
        let shop = Shop::new().await;
        let a = shop.product("Tazza", 800, 10, true).await;
        let b = shop.product("Piatto", 1_200, 10, true).await;
        shop.carts
            .add_to_cart(shop.user_id, CartItemRequest::new(a, 1))
            .await
            .unwrap();

        let err = shop
            .carts
            .remove_from_cart(shop.user_id, b)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Prodotto non nel carrello");

        let cart = shop.carts.remove_from_cart(shop.user_id, a).await.unwrap();
        assert!(cart.items.is_empty());
    }

    #[tokio::test]
    async fn quantity_must_be_positive() {
        let shop = Shop::new().await;
        let p = shop.product("Tazza", 800, 10, true).await;
        let err = shop
            .carts
            .add_to_cart(shop.user_id, CartItemRequest::new(p, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShopError::Validation(ref m) if m == &["Quantità deve essere almeno 1"]
        ));
    }

    #[tokio::test]
    async fn repeated_adds_cannot_exceed_stock() {
        let shop = Shop::new().await;
        let p = shop.product("Tazza", 800, 5, true).await;

        shop.carts
            .add_to_cart(shop.user_id, CartItemRequest::new(p, 3))
            .await
            .unwrap();
        let err = shop
            .carts
            .add_to_cart(shop.user_id, CartItemRequest::new(p, 3))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Quantità non disponibile");

        let cart = shop.carts.get_cart(shop.user_id).await.unwrap();
        assert_eq!(cart.items[0].quantity, 3);
    }

    #[tokio::test]
    async fn huge_quantities_do_not_overflow() {
        let shop = Shop::new().await;
        let a = shop.product("Bullone", 1, i32::MAX, true).await;
        let b = shop.product("Dado", 1, i32::MAX, true).await;

        for p in [a, b] {
            shop.carts
                .add_to_cart(shop.user_id, CartItemRequest::new(p, 2_000_000_000))
                .await
                .unwrap();
        }
        let err = shop
            .carts
            .add_to_cart(shop.user_id, CartItemRequest::new(a, 2_000_000_000))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Quantità non disponibile");

        let cart = shop.carts.get_cart(shop.user_id).await.unwrap();
        assert_eq!(cart.items.len(), 2);
        assert!(cart.items.iter().all(|i| i.quantity == 2_000_000_000));
        assert_eq!(cart.total_items, 4_000_000_000);
        assert_eq!(cart.total_amount, Money::from_cents(4_000_000_000));
    }

    #[tokio::test]
    async fn oversized_price_is_an_error_not_a_panic() {
        let shop = Shop::new().await;
        let price: Money = "50000000000000000000000000000".parse().unwrap();
        let p = shop.product_priced("Yacht", price, 10, true).await;

        let err = shop
            .carts
            .add_to_cart(shop.user_id, CartItemRequest::new(p, 2))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Importo fuori dai limiti consentiti");
    }
}
