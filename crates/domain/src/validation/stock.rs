use async_trait::async_trait;
use common::UserId;
use store::{CartLine, Transaction};

use super::{OrderValidator, ValidatorError};

/// Largest quantity of a single product accepted in one order.
pub const MAX_QUANTITY_PER_PRODUCT: i32 = 99;

/// Checks every line against product availability.
///
/// The stock read here is advisory; the decrement performed while the order
/// is written is the authoritative check.
#[derive(Debug, Clone)]
pub struct StockValidator {
    enabled: bool,
}

impl StockValidator {
    pub const NAME: &'static str = "Stock";

    pub fn new() -> Self {
        Self { enabled: true }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for StockValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderValidator for StockValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        20
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
        for CartLine { item, product } in lines {
            if !product.active {
                return Err(ValidatorError::Rejected(format!(
                    "Il prodotto '{}' non è più disponibile",
                    product.name
                )));
            }

            if product.stock_quantity < item.quantity {
                tracing::warn!(
                    %user_id,
                    product_id = %product.id,
                    requested = item.quantity,
                    available = product.stock_quantity,
                    "insufficient stock"
                );
                return Err(ValidatorError::Rejected(format!(
                    "Prodotto '{}': richiesti {} pezzi ma disponibili solo {}",
                    product.name, item.quantity, product.stock_quantity
                )));
            }

            if item.quantity > MAX_QUANTITY_PER_PRODUCT {
                return Err(ValidatorError::Rejected(format!(
                    "Quantità troppo alta per '{}'. Massimo {} pezzi per prodotto",
                    product.name, MAX_QUANTITY_PER_PRODUCT
                )));
            }
        }
        Ok(())
    }
}
