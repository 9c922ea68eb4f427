//! Offer redemptions.
//!
//! A redemption is idempotent per `(offer_id, user_id)` — a different
//! idempotency domain than the wallet ledger's per-reference keys.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OfferRedemption {
    pub offer_id: Uuid,
    pub user_id: Uuid,
    /// Audit context (provider session/payment references).
    pub meta: serde_json::Value,
    pub created_at: time::OffsetDateTime,
}

/// Data for recording one redemption.
#[derive(Debug, Clone)]
pub struct NewRedemption {
    pub offer_id: Uuid,
    pub user_id: Uuid,
    pub meta: serde_json::Value,
}

/// Outcome of an atomic redemption insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionOutcome {
    Recorded,
    AlreadyRedeemed,
}
