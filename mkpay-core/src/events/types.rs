//! Alert type definitions.

use uuid::Uuid;

/// Conditions surfaced to operators.
#[derive(Debug, Clone)]
pub enum OpsAlert {
    /// An event exhausted its retry budget (or hit a fatal error) and was
    /// moved to the dead-letter queue.
    EventParked {
        external_id: String,
        reason: String,
    },
    /// A wallet debit was refused because the balance could not cover it.
    /// The triggering event is parked alongside this alert.
    InsufficientFunds {
        external_id: String,
        wallet_id: Uuid,
        balance: i64,
        requested: i64,
    },
}

impl OpsAlert {
    /// The dedup identity of the event that raised the alert.
    pub fn external_id(&self) -> &str {
        match self {
            OpsAlert::EventParked { external_id, .. } => external_id,
            OpsAlert::InsufficientFunds { external_id, .. } => external_id,
        }
    }
}
