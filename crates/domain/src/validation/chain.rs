use std::sync::Arc;

use common::UserId;
use store::{CartLine, Transaction};

use super::{
    DailyLimitValidator, EmptyCartValidator, OrderPolicy, OrderValidator, PriceLimitValidator,
    StockValidator, ValidatorError,
};
use crate::clock::Clock;
use crate::error::{Result, ShopError};

/// The ordered set of validators applied before an order is persisted.
///
/// Enabling and ordering are resolved on every run, so the chain holds no
/// per-call state and can be shared between concurrent requests.
#[derive(Clone, Default)]
pub struct ValidatorChain {
    validators: Vec<Arc<dyn OrderValidator>>,
}

impl ValidatorChain {
    pub fn new(validators: Vec<Arc<dyn OrderValidator>>) -> Self {
        Self { validators }
    }

    /// The four built-in validators configured from `policy`.
    pub fn standard(policy: &OrderPolicy, clock: Arc<dyn Clock>) -> Self {
        Self::default()
            .with(EmptyCartValidator::new().enabled(policy.is_enabled(EmptyCartValidator::NAME)))
            .with(
                PriceLimitValidator::new(policy.max_amount)
                    .enabled(policy.is_enabled(PriceLimitValidator::NAME)),
            )
            .with(StockValidator::new().enabled(policy.is_enabled(StockValidator::NAME)))
            .with(
                DailyLimitValidator::new(policy.daily_limit, policy.calendar, clock)
                    .enabled(policy.is_enabled(DailyLimitValidator::NAME)),
            )
    }

    pub fn with(mut self, validator: impl OrderValidator + 'static) -> Self {
        self.register(Arc::new(validator));
        self
    }

    pub fn register(&mut self, validator: Arc<dyn OrderValidator>) {
        self.validators.push(validator);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Names of the validators that would run, in execution order.
    pub fn execution_order(&self) -> Vec<String> {
        self.active().iter().map(|v| v.name().to_string()).collect()
    }

    fn active(&self) -> Vec<&Arc<dyn OrderValidator>> {
        let mut active: Vec<_> = self.validators.iter().filter(|v| v.is_enabled()).collect();
        active.sort_by_key(|v| v.order());
        active
    }

    /// Runs every enabled validator in ascending order.
    ///
    /// A rejection is returned as [`ShopError::Business`] with the
    /// validator's message. A validator that fails to evaluate is reported
    /// as a business failure naming it; its cause is only logged.
    #[tracing::instrument(skip(self, tx, lines), fields(items = lines.len()))]
    pub async fn validate(
        &self,
        tx: &mut dyn Transaction,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<()> {
        for validator in self.active() {
            tracing::debug!(validator = validator.name(), "running order validator");

            match validator.validate(tx, user_id, lines).await {
                Ok(()) => {}
                Err(ValidatorError::Rejected(message)) => {
                    metrics::counter!(
                        "order_validation_rejections_total",
                        "validator" => validator.name().to_string()
                    )
                    .increment(1);
                    tracing::warn!(validator = validator.name(), %user_id, %message, "order rejected");
                    return Err(ShopError::Business(message));
                }
                Err(ValidatorError::Failed(error)) => {
                    tracing::error!(validator = validator.name(), %user_id, %error, "order validator failed");
                    return Err(ShopError::Business(format!(
                        "Errore interno durante la validazione dell'ordine: {}",
                        validator.name()
                    )));
                }
            }
        }
        Ok(())
    }
}
