//! Listeners turning domain events into customer notifications.

use async_trait::async_trait;
use domain::ShopEvent;

use crate::Result;
use crate::dispatcher::{Notification, NotificationDispatcher};
use crate::listener::EventListener;

/// Name used when none can be derived.
pub const FALLBACK_FIRST_NAME: &str = "Cliente";

/// Guesses a first name from an email address.
///
/// `mario.rossi@example.com` becomes `Mario`: the local part up to the first
/// dot, capitalized, with the rest lower-cased. Anything unusable yields
/// [`FALLBACK_FIRST_NAME`].
pub fn first_name_from_email(email: &str) -> String {
    let local = email.trim().split('@').next().unwrap_or_default();
    let name = local.split('.').next().unwrap_or_default();

    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => FALLBACK_FIRST_NAME.to_string(),
    }
}

/// Sends an `ORDER_CREATED` notification for every committed order.
pub struct OrderNotificationListener {
    dispatcher: NotificationDispatcher,
}

impl OrderNotificationListener {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl EventListener for OrderNotificationListener {
    fn name(&self) -> &'static str {
        "OrderNotificationListener"
    }

    async fn handle(&self, event: &ShopEvent) -> Result<()> {
        let ShopEvent::OrderCreated(created) = event else {
            return Ok(());
        };

        tracing::debug!(order_id = %created.order_id, order_number = %created.order_number, "order created, notifying customer");
        self.dispatcher.dispatch(Notification::OrderCreated {
            email: created.user_email.clone(),
            first_name: first_name_from_email(&created.user_email),
            order_number: created.order_number.clone(),
        });
        Ok(())
    }
}

/// Sends a `WELCOME` notification for every registration.
pub struct WelcomeNotificationListener {
    dispatcher: NotificationDispatcher,
}

impl WelcomeNotificationListener {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl EventListener for WelcomeNotificationListener {
    fn name(&self) -> &'static str {
        "WelcomeNotificationListener"
    }

    async fn handle(&self, event: &ShopEvent) -> Result<()> {
        let ShopEvent::UserRegistered(registered) = event else {
            return Ok(());
        };

        let first_name = match registered.first_name.trim() {
            "" => first_name_from_email(&registered.email),
            name => name.to_string(),
        };
        self.dispatcher.dispatch(Notification::Welcome {
            email: registered.email.clone(),
            first_name,
        });
        Ok(())
    }
}
