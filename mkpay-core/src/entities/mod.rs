pub mod boost;
pub mod order;
pub mod processed_event;
pub mod redemption;
pub mod wallet;

use mkpay_sdk::objects::{
    EventKind as SdkEventKind, OrderStatus as SdkOrderStatus, OwnerType as SdkOwnerType,
};

/// Provider event kind for database operations.
///
/// This is the sqlx::Type version. For wire/DTO use, see
/// `mkpay_sdk::objects::EventKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "event_kind")]
pub enum EventKind {
    CheckoutCompleted,
    PaymentFailed,
    ChargeRefunded,
    PaymentSucceeded,
}

impl From<EventKind> for SdkEventKind {
    fn from(value: EventKind) -> Self {
        match value {
            EventKind::CheckoutCompleted => SdkEventKind::CheckoutCompleted,
            EventKind::PaymentFailed => SdkEventKind::PaymentFailed,
            EventKind::ChargeRefunded => SdkEventKind::ChargeRefunded,
            EventKind::PaymentSucceeded => SdkEventKind::PaymentSucceeded,
        }
    }
}

impl From<SdkEventKind> for EventKind {
    fn from(value: SdkEventKind) -> Self {
        match value {
            SdkEventKind::CheckoutCompleted => EventKind::CheckoutCompleted,
            SdkEventKind::PaymentFailed => EventKind::PaymentFailed,
            SdkEventKind::ChargeRefunded => EventKind::ChargeRefunded,
            SdkEventKind::PaymentSucceeded => EventKind::PaymentSucceeded,
        }
    }
}

/// Order status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see
/// `mkpay_sdk::objects::OrderStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "order_status")]
pub enum OrderStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl From<OrderStatus> for SdkOrderStatus {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::Pending => SdkOrderStatus::Pending,
            OrderStatus::Succeeded => SdkOrderStatus::Succeeded,
            OrderStatus::Failed => SdkOrderStatus::Failed,
            OrderStatus::Refunded => SdkOrderStatus::Refunded,
        }
    }
}

impl From<SdkOrderStatus> for OrderStatus {
    fn from(value: SdkOrderStatus) -> Self {
        match value {
            SdkOrderStatus::Pending => OrderStatus::Pending,
            SdkOrderStatus::Succeeded => OrderStatus::Succeeded,
            SdkOrderStatus::Failed => OrderStatus::Failed,
            SdkOrderStatus::Refunded => OrderStatus::Refunded,
        }
    }
}

/// Wallet owner type for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "owner_type")]
pub enum OwnerType {
    User,
    Garage,
    System,
}

impl OwnerType {
    /// Whether this owner type's wallets may carry a negative balance.
    /// System wallets model liabilities and may go negative; owned wallets
    /// may not.
    pub fn allows_negative_balance(self) -> bool {
        matches!(self, OwnerType::System)
    }
}

impl From<OwnerType> for SdkOwnerType {
    fn from(value: OwnerType) -> Self {
        match value {
            OwnerType::User => SdkOwnerType::User,
            OwnerType::Garage => SdkOwnerType::Garage,
            OwnerType::System => SdkOwnerType::System,
        }
    }
}

impl From<SdkOwnerType> for OwnerType {
    fn from(value: SdkOwnerType) -> Self {
        match value {
            SdkOwnerType::User => OwnerType::User,
            SdkOwnerType::Garage => OwnerType::Garage,
            SdkOwnerType::System => OwnerType::System,
        }
    }
}
