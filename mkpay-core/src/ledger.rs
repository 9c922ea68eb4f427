//! The wallet ledger — the only component permitted to mutate balances,
//! and only via appended transactions.
//!
//! Every movement carries a caller-supplied `(ref_type, ref_id, purpose)`
//! tuple; the derived idempotency key makes retried calls safe: a repeat
//! with the same key returns the prior transaction without re-applying,
//! even if the repeat names a different amount.

use std::sync::Arc;

use uuid::Uuid;

use crate::entities::OwnerType;
use crate::entities::wallet::{NewLedgerEntry, RefType, Wallet, WalletTransaction};
use crate::store::{LedgerApply, Store, StoreError};

/// Errors surfaced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be a positive integer, got {0}")]
    InvalidAmount(i64),

    /// Terminal for the triggering side effect; blind retry would never
    /// succeed without an external balance change.
    #[error("insufficient funds in wallet {wallet_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet_id: Uuid,
        balance: i64,
        requested: i64,
    },

    #[error("wallet {0} not found")]
    WalletNotFound(Uuid),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Result of a credit or debit.
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    pub transaction: WalletTransaction,
    /// True when the idempotency key already existed and the prior
    /// transaction was returned instead of a new application.
    pub duplicate: bool,
}

/// Handle over the store's atomic ledger primitive.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    currency: String,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, currency: impl Into<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
        }
    }

    /// Credit `amount` (positive, minor units) to a wallet.
    ///
    /// The wallet is created lazily with balance 0 if absent; `owner` is the
    /// attribution used for that case (falls back to the wallet id itself
    /// when the event names no owner).
    pub async fn credit(
        &self,
        wallet_id: Uuid,
        amount: i64,
        ref_type: RefType,
        ref_id: &str,
        purpose: &str,
        owner: Option<(OwnerType, Uuid)>,
    ) -> Result<LedgerReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let entry = NewLedgerEntry {
            wallet_id,
            amount,
            ref_type,
            ref_id: ref_id.to_owned(),
            purpose: purpose.to_owned(),
        };
        let default_owner = owner.unwrap_or((OwnerType::User, wallet_id));
        self.apply(entry, default_owner).await
    }

    /// Debit `amount` (positive, minor units) from a wallet.
    ///
    /// Owned wallets may never go negative; system wallets may, to model
    /// liabilities.
    pub async fn debit(
        &self,
        wallet_id: Uuid,
        amount: i64,
        ref_type: RefType,
        ref_id: &str,
        purpose: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let entry = NewLedgerEntry {
            wallet_id,
            amount: -amount,
            ref_type,
            ref_id: ref_id.to_owned(),
            purpose: purpose.to_owned(),
        };
        self.apply(entry, (OwnerType::User, wallet_id)).await
    }

    /// Resolve the wallet owned by `(owner_type, owner_id)`, creating it if
    /// absent (legacy top-up path).
    pub async fn resolve_wallet(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
    ) -> Result<Wallet, LedgerError> {
        Ok(self
            .store
            .find_or_create_wallet(owner_type, owner_id, &self.currency)
            .await?)
    }

    async fn apply(
        &self,
        entry: NewLedgerEntry,
        default_owner: (OwnerType, Uuid),
    ) -> Result<LedgerReceipt, LedgerError> {
        let wallet_id = entry.wallet_id;
        let requested = entry.amount;
        match self
            .store
            .apply_ledger_entry(entry, default_owner, &self.currency)
            .await?
        {
            LedgerApply::Applied(transaction) => Ok(LedgerReceipt {
                transaction,
                duplicate: false,
            }),
            LedgerApply::Duplicate(transaction) => {
                if transaction.amount != requested {
                    tracing::warn!(
                        wallet_id = %wallet_id,
                        idempotency_key = %transaction.idempotency_key,
                        prior_amount = transaction.amount,
                        requested_amount = requested,
                        "duplicate ledger apply with differing amount; prior application stands"
                    );
                }
                Ok(LedgerReceipt {
                    transaction,
                    duplicate: true,
                })
            }
            LedgerApply::InsufficientFunds { balance } => Err(LedgerError::InsufficientFunds {
                wallet_id,
                balance,
                requested,
            }),
            LedgerApply::WalletNotFound => Err(LedgerError::WalletNotFound(wallet_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryStore::new()), "AED")
    }

    #[tokio::test]
    async fn credit_rejects_non_positive_amounts() {
        let ledger = ledger();
        let wallet_id = Uuid::now_v7();
        for amount in [0, -5] {
            let err = ledger
                .credit(wallet_id, amount, RefType::Order, "ORD1", "wallet_credit", None)
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(_)));
        }
    }

    #[tokio::test]
    async fn debit_beyond_balance_is_insufficient_funds() {
        let ledger = ledger();
        let wallet_id = Uuid::now_v7();
        ledger
            .credit(wallet_id, 100, RefType::Order, "ORD1", "wallet_credit", None)
            .await
            .unwrap();
        let err = ledger
            .debit(wallet_id, 150, RefType::Order, "ORD2", "payout")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                balance: 100,
                requested: -150,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn repeated_credit_same_reference_applies_once() {
        let ledger = ledger();
        let wallet_id = Uuid::now_v7();
        let first = ledger
            .credit(wallet_id, 500, RefType::Order, "ORD9", "wallet_credit", None)
            .await
            .unwrap();
        assert!(!first.duplicate);
        let second = ledger
            .credit(wallet_id, 500, RefType::Order, "ORD9", "wallet_credit", None)
            .await
            .unwrap();
        assert!(second.duplicate);
        assert_eq!(second.transaction, first.transaction);
    }
}
