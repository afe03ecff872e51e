use async_trait::async_trait;
use common::UserId;
use store::{CartLine, Transaction};

use super::{OrderValidator, ValidatorError};

/// Refuses orders from an empty cart.
#[derive(Debug, Clone)]
pub struct EmptyCartValidator {
    enabled: bool,
}

impl EmptyCartValidator {
    pub const NAME: &'static str = "EmptyCart";

    pub fn new() -> Self {
        Self { enabled: true }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for EmptyCartValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderValidator for EmptyCartValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        1
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
        if lines.is_empty() {
            tracing::warn!(%user_id, "order attempted with empty cart");
            return Err(ValidatorError::rejected(
                "Impossibile creare ordine: il carrello è vuoto",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use store::{InMemoryStore, Store};

    use super::*;
    use crate::validation::test_support::line;

    #[tokio::test]
    async fn rejects_empty_cart() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = EmptyCartValidator::new()
            .validate(tx.as_mut(), UserId::new(1), &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("il carrello è vuoto"));
    }

    #[tokio::test]
    async fn accepts_any_item() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        EmptyCartValidator::new()
            .validate(tx.as_mut(), UserId::new(1), &[line(1, "Penna", 150, 1, 1)])
            .await
            .unwrap();
    }
}
