//! Service API objects.
//!
//! These are exchanged with the selling-side backend over the signed-body
//! Service API. Orders are minted by the selling side *before* payment and
//! registered here in `pending`; payment events transition them afterwards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderStatus;
use crate::signature::Signature;

/// Register a pending order minted by the selling side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// Opaque order identifier minted by the selling side.
    pub order_id: Uuid,
    /// Amount in minor currency units.
    pub amount: i64,
}

impl Signature for CreateOrderRequest {}

/// Look up the status of an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetOrderRequest {
    pub order_id: Uuid,
}

impl Signature for GetOrderRequest {}

/// Order state as returned by the Service API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub amount: i64,
    pub provider_payment_ref: Option<String>,
    pub updated_at: i64,
}
