use async_trait::async_trait;
use common::{Money, UserId};
use store::{CartLine, Transaction};

use super::{OrderValidator, ValidatorError};

/// Refuses orders whose total exceeds a configured ceiling.
#[derive(Debug, Clone)]
pub struct PriceLimitValidator {
    max_amount: Money,
    enabled: bool,
}

impl PriceLimitValidator {
    pub const NAME: &'static str = "PriceLimit";

    pub fn new(max_amount: Money) -> Self {
        Self {
            max_amount,
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn max_amount(&self) -> Money {
        self.max_amount
    }
}

#[async_trait]
impl OrderValidator for PriceLimitValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        10
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn validate(
        &self,
        _tx: &mut dyn Transaction,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<(), ValidatorError> {
        let Some(total) = CartLine::total_of(lines) else {
            tracing::warn!(%user_id, "order total overflows");
            return Err(ValidatorError::Rejected(format!(
                "Ordine troppo grande. Il limite massimo è €{}. \
                 Per ordini superiori contatta il supporto clienti.",
                self.max_amount
            )));
        };
        tracing::debug!(%user_id, %total, max = %self.max_amount, "checking order total");

        if total > self.max_amount {
            return Err(ValidatorError::Rejected(format!(
                "Ordine troppo grande (€{total}). Il limite massimo è €{}. \
                 Per ordini superiori contatta il supporto clienti.",
                self.max_amount
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use store::{InMemoryStore, Store};

    use super::*;
    use crate::validation::test_support::line;

    async fn check(lines: &[CartLine]) -> Result<(), ValidatorError> {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        PriceLimitValidator::new(Money::from_cents(500_000))
            .validate(tx.as_mut(), UserId::new(1), lines)
            .await
    }

    #[tokio::test]
    async fn total_equal_to_limit_passes() {
        check(&[line(1, "Divano", 250_000, 5, 2)]).await.unwrap();
    }

    #[tokio::test]
    async fn one_cent_over_is_rejected() {
        let err = check(&[line(1, "Divano", 250_000, 5, 2), line(2, "Penna", 1, 5, 1)])
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Ordine troppo grande (€5000.01)"));
        assert!(message.contains("limite massimo è €5000.00"));
    }

    #[tokio::test]
    async fn message_formats_both_amounts_with_two_decimals() {
        let err = check(&[line(1, "TV", 600_000, 10, 1)]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ordine troppo grande (€6000.00). Il limite massimo è €5000.00. \
             Per ordini superiori contatta il supporto clienti."
        );
    }

    #[tokio::test]
    async fn overflowing_total_is_rejected() {
        let mut yacht = line(1, "Yacht", 1, 5, 2);
        yacht.product.price = Money::new(rust_decimal::Decimal::MAX);

        let err = check(&[yacht]).await.unwrap_err();
        assert!(matches!(err, ValidatorError::Rejected(_)));
        assert!(err.to_string().starts_with("Ordine troppo grande."));
    }
}
