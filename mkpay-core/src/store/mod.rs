//! Storage seam for the event-processing core.
//!
//! Every method is atomic with respect to concurrent callers: the claim,
//! the conditional order transition, and the ledger apply are the three
//! primitives the pipeline's exactly-once guarantees rest on. Two adapters
//! exist: [`postgres::PgStore`] (production) and [`memory::MemoryStore`]
//! (tests and local development).

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::entities::boost::{ActivationOutcome, Boost, NewBoost};
use crate::entities::order::{NewOrder, Order, OrderLookup, TransitionOutcome};
use crate::entities::processed_event::{ClaimOutcome, DeadLetter, ProcessedEvent};
use crate::entities::redemption::{NewRedemption, RedemptionOutcome};
use crate::entities::wallet::{NewLedgerEntry, Wallet, WalletTransaction};
use crate::entities::{EventKind, OrderStatus, OwnerType};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shared handle to a store implementation.
pub type SharedStore = Arc<dyn Store>;

/// Errors surfaced by storage adapters.
///
/// Anything in here is treated as transient by the pipeline: nothing was
/// committed, so the whole event is safe to retry from scratch.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of an atomic ledger apply.
#[derive(Debug, Clone)]
pub enum LedgerApply {
    /// The transaction was appended and the balance updated.
    Applied(WalletTransaction),
    /// A transaction with the same idempotency key already exists; the prior
    /// row is returned and nothing was re-applied.
    Duplicate(WalletTransaction),
    /// The debit would take an owned wallet negative.
    InsufficientFunds { balance: i64 },
    /// The wallet does not exist (debits only; credits create lazily).
    WalletNotFound,
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // -- event store ----------------------------------------------------

    /// Atomically claim `external_id` for processing.
    ///
    /// First claimant wins; concurrent duplicates observe [`ClaimOutcome::InFlight`].
    /// A `pending` claim older than `stale_after` is taken over (crashed
    /// worker recovery). The raw payload is stored with the claim so a later
    /// park keeps enough context for manual replay.
    async fn claim_event(
        &self,
        external_id: &str,
        kind: EventKind,
        payload_hash: &str,
        payload: &serde_json::Value,
        stale_after: Duration,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Commit a claim: mark the event fully processed and drop the stored
    /// payload (the hash remains for audit).
    async fn mark_event_processed(&self, external_id: &str) -> Result<(), StoreError>;

    /// Release a claim without committing, leaving no trace, so the next
    /// delivery starts from scratch.
    async fn release_event(&self, external_id: &str) -> Result<(), StoreError>;

    /// Park a claimed event in the dead-letter state for manual review.
    async fn park_event(&self, external_id: &str, reason: &str) -> Result<(), StoreError>;

    /// Move a dead-lettered event back to `pending` and return its stored
    /// payload for replay. Returns `None` if no dead letter exists.
    async fn reopen_dead_letter(&self, external_id: &str)
    -> Result<Option<DeadLetter>, StoreError>;

    /// Look up the durable marker for an external event id.
    async fn find_event(&self, external_id: &str) -> Result<Option<ProcessedEvent>, StoreError>;

    /// List dead-lettered events, newest first.
    async fn list_dead_letters(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DeadLetter>, StoreError>;

    // -- orders ---------------------------------------------------------

    /// Register a pending order minted by the selling side.
    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Conditionally transition an order along the legal edge set.
    ///
    /// The predecessor check and the update happen in one atomic step;
    /// `provider_ref` is persisted onto the order when given.
    async fn transition_order(
        &self,
        lookup: &OrderLookup,
        target: OrderStatus,
        provider_ref: Option<&str>,
    ) -> Result<TransitionOutcome, StoreError>;

    // -- wallets & ledger -----------------------------------------------

    /// Find the wallet owned by `(owner_type, owner_id)`, creating it with
    /// balance 0 if absent.
    async fn find_or_create_wallet(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        currency: &str,
    ) -> Result<Wallet, StoreError>;

    async fn get_wallet(&self, wallet_id: Uuid) -> Result<Option<Wallet>, StoreError>;

    /// Atomically append a ledger transaction and update the cached balance.
    ///
    /// The idempotency-key uniqueness constraint is the concurrency guard:
    /// a concurrent duplicate apply loses the insert race and is reported as
    /// [`LedgerApply::Duplicate`] with the winner's row. Credits to a wallet
    /// id that does not exist yet create it lazily; `default_owner` supplies
    /// the attribution for that case.
    async fn apply_ledger_entry(
        &self,
        entry: NewLedgerEntry,
        default_owner: (OwnerType, Uuid),
        currency: &str,
    ) -> Result<LedgerApply, StoreError>;

    async fn list_wallets(&self, limit: i64, offset: i64) -> Result<Vec<Wallet>, StoreError>;

    async fn wallet_transactions(
        &self,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, StoreError>;

    // -- redemptions & boosts -------------------------------------------

    /// Record an offer redemption, idempotent per `(offer_id, user_id)`.
    async fn record_redemption(
        &self,
        redemption: NewRedemption,
    ) -> Result<RedemptionOutcome, StoreError>;

    /// Register a pending boost (collaborator-facing).
    async fn create_boost(&self, boost: NewBoost) -> Result<Boost, StoreError>;

    /// Flip a boost to active. Idempotent.
    async fn activate_boost(&self, boost_id: Uuid) -> Result<ActivationOutcome, StoreError>;
}
