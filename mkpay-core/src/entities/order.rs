//! Order records and the transition rules of the order state machine.
//!
//! Transitions are monotonic along a fixed edge set:
//!
//! ```text
//! pending ──▶ succeeded ──▶ refunded
//!    └──────▶ failed
//! ```
//!
//! Everything else is illegal. Out-of-order webhook deliveries routinely
//! attempt illegal edges (e.g. a late `payment_failed` after success), so a
//! rejected transition is a reporting condition, not a crash.

use uuid::Uuid;

use super::OrderStatus;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Order {
    pub order_id: Uuid,
    pub status: OrderStatus,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Provider-side payment reference, set when the checkout succeeds.
    pub provider_payment_ref: Option<String>,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

/// Data for registering a new pending order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: Uuid,
    pub amount: i64,
}

/// How to locate the order a payment event refers to.
///
/// Success events carry the internal order id in checkout metadata; failure
/// and refund events may only carry the provider's payment reference.
#[derive(Debug, Clone)]
pub enum OrderLookup {
    ById(Uuid),
    ByProviderRef(String),
}

impl std::fmt::Display for OrderLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderLookup::ById(id) => write!(f, "order_id={id}"),
            OrderLookup::ByProviderRef(r) => write!(f, "provider_ref={r}"),
        }
    }
}

impl OrderStatus {
    /// The single valid predecessor of `target`, or `None` if `target`
    /// cannot be entered by a transition (orders are *created* pending,
    /// never transitioned into it).
    pub fn valid_predecessor(target: OrderStatus) -> Option<OrderStatus> {
        match target {
            OrderStatus::Pending => None,
            OrderStatus::Succeeded => Some(OrderStatus::Pending),
            OrderStatus::Failed => Some(OrderStatus::Pending),
            OrderStatus::Refunded => Some(OrderStatus::Succeeded),
        }
    }

    /// Whether `self -> target` is a legal edge.
    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        OrderStatus::valid_predecessor(target) == Some(self)
    }
}

/// Result of a conditional order transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The edge was legal and has been committed.
    Applied(Order),
    /// The order already sits in the target state; re-application is a no-op
    /// so retried dispatches stay safe.
    AlreadyInTarget(Order),
    /// The current status is not a valid predecessor of the target.
    Illegal { current: OrderStatus },
    /// No order matched the lookup.
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_edges() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Succeeded));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Failed));
        assert!(OrderStatus::Succeeded.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn illegal_edges() {
        // failed must never become succeeded from a stale delivery
        assert!(!OrderStatus::Failed.can_transition_to(OrderStatus::Succeeded));
        assert!(!OrderStatus::Failed.can_transition_to(OrderStatus::Refunded));
        // refunded is terminal
        assert!(!OrderStatus::Refunded.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Refunded.can_transition_to(OrderStatus::Succeeded));
        // nothing transitions back into pending
        assert!(!OrderStatus::Succeeded.can_transition_to(OrderStatus::Pending));
        // no self loops
        assert!(!OrderStatus::Succeeded.can_transition_to(OrderStatus::Succeeded));
    }
}
