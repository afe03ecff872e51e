//! HTTP API server for the shop backend.
//!
//! Provides REST endpoints for accounts, catalog, cart and orders, with
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};
use domain::{EventPublisher, SystemClock};
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::{
    EventBus, EventBusHandle, EventListener, NotificationDispatcher, OrderNotificationListener,
    WelcomeNotificationListener,
};
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::JwtService;
use config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/me", get(routes::auth::me))
        .route(
            "/api/products",
            get(routes::products::list).post(routes::products::create),
        )
        .route("/api/products/search", get(routes::products::search))
        .route("/api/products/{id}", get(routes::products::get))
        .route(
            "/api/categories",
            get(routes::categories::list).post(routes::categories::create),
        )
        .route("/api/categories/{id}", get(routes::categories::get))
        .route("/api/cart/{user_id}", get(routes::cart::get))
        .route("/api/cart/{user_id}/add", post(routes::cart::add))
        .route(
            "/api/cart/{user_id}/product/{product_id}",
            delete(routes::cart::remove),
        )
        .route("/api/cart/{user_id}/clear", delete(routes::cart::clear))
        .route(
            "/api/orders/{id}",
            get(routes::orders::get).post(routes::orders::create),
        )
        .route("/api/orders/user/{user_id}", get(routes::orders::list_for_user))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .route("/health", get(routes::ops::health))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Starts the event bus with the notification listeners.
pub fn start_event_bus(
    config: &Config,
) -> Result<(EventBus, EventBusHandle), notifications::NotificationError> {
    let dispatcher = NotificationDispatcher::new(
        config.notification_url.clone(),
        config.notification_timeout,
    )?;
    if !dispatcher.is_enabled() {
        tracing::warn!("NOTIFICATION_URL not set, notifications will be skipped");
    }

    let listeners: Vec<Arc<dyn EventListener>> = vec![
        Arc::new(OrderNotificationListener::new(dispatcher.clone())),
        Arc::new(WelcomeNotificationListener::new(dispatcher)),
    ];
    Ok(EventBus::start(config.event_bus, listeners))
}

/// Wires services over a store and an event publisher.
pub fn create_state(
    config: &Config,
    store: Arc<dyn Store>,
    publisher: Arc<dyn EventPublisher>,
) -> AppState {
    AppState::new(
        store,
        publisher,
        Arc::new(SystemClock),
        &config.order_policy,
        JwtService::new(config.jwt_secret.as_bytes(), config.jwt_expiration),
    )
}
