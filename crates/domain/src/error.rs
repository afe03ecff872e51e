//! Domain error types.

use store::StoreError;
use thiserror::Error;
use validator::Validate;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum ShopError {
    /// A business rule refused the operation. The message is shown to the
    /// customer as-is.
    #[error("{0}")]
    Business(String),

    /// A request referenced something unusable, such as an unknown user.
    #[error("{0}")]
    InvalidInput(String),

    /// Field validation failed; one message per violated constraint.
    #[error("Errori di validazione: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// The addressed entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Any other failure. Never shown to the customer.
    #[error("{0}")]
    Internal(String),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, ShopError>;

impl ShopError {
    pub fn business(message: impl Into<String>) -> Self {
        ShopError::Business(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        ShopError::InvalidInput(message.into())
    }

    /// A computed amount no longer fits the money type.
    pub fn amount_out_of_range() -> Self {
        ShopError::InvalidInput("Importo fuori dai limiti consentiti".into())
    }
}

/// Runs field validation, collecting every message in a stable order.
pub fn validate_request<T: Validate>(request: &T) -> Result<()> {
    let Err(errors) = request.validate() else {
        return Ok(());
    };

    let mut messages: Vec<String> = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .map(|e| {
            e.message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string())
        })
        .collect();
    messages.sort();
    messages.dedup();
    Err(ShopError::Validation(messages))
}
