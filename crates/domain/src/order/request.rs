use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::rules::not_blank;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Indirizzo di spedizione è obbligatorio"))]
    pub shipping_address: String,
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn new(shipping_address: impl Into<String>) -> Self {
        Self {
            shipping_address: shipping_address.into(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
