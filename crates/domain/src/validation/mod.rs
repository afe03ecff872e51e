//! Order validation policies.
//!
//! Each [`OrderValidator`] checks one business rule against the cart about
//! to become an order. The [`ValidatorChain`] runs every enabled validator in
//! ascending `order` and stops at the first rejection.

mod chain;
mod daily_limit;
mod empty_cart;
mod price_limit;
mod stock;

use async_trait::async_trait;
use common::{Money, UserId};
use rust_decimal::Decimal;
use store::{CartLine, StoreError, Transaction};
use thiserror::Error;

use crate::clock::BusinessCalendar;

pub use chain::ValidatorChain;
pub use daily_limit::DailyLimitValidator;
pub use empty_cart::EmptyCartValidator;
pub use price_limit::PriceLimitValidator;
pub use stock::{MAX_QUANTITY_PER_PRODUCT, StockValidator};

/// Outcome of a validator that did not pass.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The rule refused the order; the message is customer-facing.
    #[error("{0}")]
    Rejected(String),

    /// The validator could not evaluate its rule.
    #[error("validator failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ValidatorError {
    pub fn rejected(message: impl Into<String>) -> Self {
        ValidatorError::Rejected(message.into())
    }
}

impl From<StoreError> for ValidatorError {
    fn from(e: StoreError) -> Self {
        ValidatorError::Failed(Box::new(e))
    }
}

/// A single business rule applied to a candidate order.
///
/// Validators read through the transaction but never write.
#[async_trait]
pub trait OrderValidator: Send + Sync {
    /// Stable name used in logs, metrics and configuration.
    fn name(&self) -> &str;

    /// Position in the chain; lower runs first.
    fn order(&self) -> i32 {
        100
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn validate(
        &self,
        tx: &mut dyn Transaction,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<(), ValidatorError>;
}

/// Tunables for the built-in validators.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPolicy {
    /// Largest accepted order total.
    pub max_amount: Money,
    /// Orders a user may place per business day.
    pub daily_limit: u32,
    /// Zone used to decide where a business day starts.
    pub calendar: BusinessCalendar,
    /// Names of built-in validators to switch off.
    pub disabled_validators: Vec<String>,
}

impl OrderPolicy {
    pub const DEFAULT_MAX_AMOUNT: Decimal = Decimal::from_parts(500_000, 0, 0, false, 2);
    pub const DEFAULT_DAILY_LIMIT: u32 = 10;

    pub fn is_enabled(&self, validator: &str) -> bool {
        !self
            .disabled_validators
            .iter()
            .any(|name| name.eq_ignore_ascii_case(validator))
    }
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            max_amount: Money::new(Self::DEFAULT_MAX_AMOUNT),
            daily_limit: Self::DEFAULT_DAILY_LIMIT,
            calendar: BusinessCalendar::default(),
            disabled_validators: Vec::new(),
        }
    }
}
