//! Wire types for the remote cart service.
//!
//! These mirror the JSON the service speaks and stay separate from the
//! store's own line item types in [`crate::models`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bulkcart_core::ProductId;

/// Full cart as returned by `getCart` and `addItem`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCart {
    /// Lines in server order.
    #[serde(default)]
    pub items: Vec<RemoteLineItem>,
}

/// One line of a remote cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price. Accepted as a JSON string or number.
    pub price: Decimal,
    /// Server-computed line total, when the server sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
}

/// Request body for `addItem`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemInput {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Error body some deployments return alongside a non-success status.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(alias = "error")]
    pub message: String,
}
