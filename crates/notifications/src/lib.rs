//! Delivery of domain events to side effects.
//!
//! This crate provides:
//! - [`EventBus`], a bounded queue implementing the domain's event port
//! - [`EventListener`] for anything that reacts to events
//! - [`NotificationDispatcher`], a fire-and-forget HTTP client for
//!   customer notifications, and the listeners that feed it

pub mod bus;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod listeners;

pub use bus::{EventBus, EventBusConfig, EventBusHandle};
pub use dispatcher::{Notification, NotificationDispatcher};
pub use error::{NotificationError, Result};
pub use listener::EventListener;
pub use listeners::{
    FALLBACK_FIRST_NAME, OrderNotificationListener, WelcomeNotificationListener,
    first_name_from_email,
};
