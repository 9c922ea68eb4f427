pub mod admin;
pub mod event;
pub mod service;

pub use event::{EventEnvelope, EventKind, EventObject};
pub use service::{CreateOrderRequest, GetOrderRequest, OrderResponse};

use serde::{Deserialize, Serialize};

/// Order status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `mkpay-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Succeeded => write!(f, "succeeded"),
            OrderStatus::Failed => write!(f, "failed"),
            OrderStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// Wallet owner type for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `mkpay-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    User,
    Garage,
    System,
}

impl std::fmt::Display for OwnerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerType::User => write!(f, "user"),
            OwnerType::Garage => write!(f, "garage"),
            OwnerType::System => write!(f, "system"),
        }
    }
}
