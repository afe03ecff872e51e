use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use store::{CartLine, Transaction};

use super::{OrderValidator, ValidatorError};
use crate::clock::{BusinessCalendar, Clock};

/// Caps the number of orders a user may place per business day.
///
/// Counting failures are logged and treated as a pass so an infrastructure
/// hiccup cannot block checkout.
pub struct DailyLimitValidator {
    limit: u32,
    calendar: BusinessCalendar,
    clock: Arc<dyn Clock>,
    enabled: bool,
}

impl DailyLimitValidator {
    pub const NAME: &'static str = "DailyLimit";

    pub fn new(limit: u32, calendar: BusinessCalendar, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit,
            calendar,
            clock,
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    async fn count_today(
        &self,
        tx: &mut dyn Transaction,
        user_id: UserId,
    ) -> Result<i64, ValidatorError> {
        if tx.find_user(user_id).await?.is_none() {
            return Err(ValidatorError::rejected("Utente non trovato"));
        }
        let (start, end) = self.calendar.day_bounds(self.clock.now());
        Ok(tx.count_user_orders_between(user_id, start, end).await?)
    }
}

#[async_trait]
impl OrderValidator for DailyLimitValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        30
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn validate(
        &self,
        tx: &mut dyn Transaction,
        user_id: UserId,
        _lines: &[CartLine],
    ) -> Result<(), ValidatorError> {
        let today = match self.count_today(tx, user_id).await {
            Ok(count) => count,
            Err(ValidatorError::Failed(error)) => {
                tracing::error!(%user_id, %error, "daily limit check skipped");
                return Ok(());
            }
            Err(rejected) => return Err(rejected),
        };

        tracing::debug!(%user_id, today, limit = self.limit, "checking daily order limit");

        if today >= i64::from(self.limit) {
            tracing::warn!(%user_id, today, limit = self.limit, "daily order limit reached");
            return Err(ValidatorError::Rejected(format!(
                "Raggiunto il limite massimo di {} ordini al giorno. \
                 Se hai necessità particolari, contatta il supporto clienti.",
                self.limit
            )));
        }
        Ok(())
    }
}
