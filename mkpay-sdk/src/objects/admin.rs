//! Admin API objects.
//!
//! Requests carry the plaintext admin secret in the
//! `Mkpay-Admin-Authorization` header; these types only model queries and
//! responses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OwnerType;

/// Clamp caller-supplied pagination to sane bounds.
pub fn clamp_pagination(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(50).clamp(1, 200);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Query parameters for paginated admin listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A parked (dead-lettered) event awaiting manual review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDeadLetterResponse {
    pub external_id: String,
    pub kind: String,
    pub reason: String,
    pub parked_at: i64,
    pub payload: serde_json::Value,
}

/// Result of replaying a parked event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRetryResponse {
    pub external_id: String,
    /// `processed` if the replay succeeded, `parked` if it dead-lettered again.
    pub outcome: String,
}

/// A wallet with its cached balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminWalletResponse {
    pub wallet_id: Uuid,
    pub owner_type: OwnerType,
    pub owner_id: Uuid,
    pub currency: String,
    pub balance: i64,
}

/// One ledger transaction row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminTransactionResponse {
    pub transaction_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: i64,
    pub ref_type: String,
    pub ref_id: String,
    pub purpose: String,
    pub idempotency_key: String,
    pub balance_after: i64,
    pub created_at: i64,
}

/// Manual wallet adjustment (signed amount; negative debits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustWalletRequest {
    /// Signed amount in minor currency units. Positive credits, negative debits.
    pub amount: i64,
    /// Caller-chosen reference making the adjustment idempotent; two requests
    /// with the same `adjustment_id` apply only once.
    pub adjustment_id: Uuid,
    /// Free-text operator note, recorded as the transaction purpose.
    pub purpose: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(clamp_pagination(None, None), (50, 0));
        assert_eq!(clamp_pagination(Some(0), Some(-5)), (1, 0));
        assert_eq!(clamp_pagination(Some(10_000), Some(30)), (200, 30));
    }
}
