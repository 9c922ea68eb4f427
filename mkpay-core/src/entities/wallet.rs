//! Wallets and the append-only transaction ledger.
//!
//! The `balance` column is a denormalized cache of
//! `SUM(wallet_transactions.amount)` for the wallet, maintained atomically
//! with every appended transaction. The composite idempotency key
//! `{ref_type}:{ref_id}:{purpose}` is unique per ledger, which is the
//! concurrency guard against double-application.

use uuid::Uuid;

use super::OwnerType;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Wallet {
    pub wallet_id: Uuid,
    pub owner_type: OwnerType,
    pub owner_id: Uuid,
    pub currency: String,
    /// Cached balance in minor currency units; always equals the sum of this
    /// wallet's transaction amounts.
    pub balance: i64,
    pub created_at: time::OffsetDateTime,
}

/// What a ledger transaction references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "ref_type")]
pub enum RefType {
    Order,
    ExternalEvent,
    AdminAdjustment,
}

impl RefType {
    pub fn as_str(self) -> &'static str {
        match self {
            RefType::Order => "order",
            RefType::ExternalEvent => "external_event",
            RefType::AdminAdjustment => "admin_adjustment",
        }
    }
}

impl std::fmt::Display for RefType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the composite idempotency key for a ledger operation.
///
/// Example: `order:018f3a2e-…:wallet_credit`.
pub fn idempotency_key(ref_type: RefType, ref_id: &str, purpose: &str) -> String {
    format!("{}:{}:{}", ref_type.as_str(), ref_id, purpose)
}

/// An immutable, append-only ledger row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct WalletTransaction {
    pub transaction_id: Uuid,
    pub wallet_id: Uuid,
    /// Signed amount; positive credits, negative debits.
    pub amount: i64,
    pub ref_type: RefType,
    pub ref_id: String,
    pub purpose: String,
    pub idempotency_key: String,
    /// Balance snapshot immediately after this transaction applied.
    pub balance_after: i64,
    pub created_at: time::OffsetDateTime,
}

/// Data for appending one ledger entry.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub wallet_id: Uuid,
    /// Signed amount; positive credits, negative debits.
    pub amount: i64,
    pub ref_type: RefType,
    pub ref_id: String,
    pub purpose: String,
}

impl NewLedgerEntry {
    pub fn idempotency_key(&self) -> String {
        idempotency_key(self.ref_type, &self.ref_id, &self.purpose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_is_stable() {
        assert_eq!(
            idempotency_key(RefType::Order, "ORD123", "wallet_credit"),
            "order:ORD123:wallet_credit"
        );
        assert_eq!(
            idempotency_key(RefType::ExternalEvent, "evt_9", "wallet_topup"),
            "external_event:evt_9:wallet_topup"
        );
    }

    #[test]
    fn distinct_purposes_produce_distinct_keys() {
        let a = idempotency_key(RefType::Order, "ORD123", "wallet_credit");
        let b = idempotency_key(RefType::Order, "ORD123", "boost_refund");
        assert_ne!(a, b);
    }
}
