//! In-memory store adapter.
//!
//! Backs the test suite and local development. Each trait method takes the
//! single interior lock once, so the atomicity semantics match the Postgres
//! adapter's transactional ones.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use uuid::Uuid;

use crate::entities::boost::{ActivationOutcome, Boost, BoostStatus, NewBoost};
use crate::entities::order::{NewOrder, Order, OrderLookup, TransitionOutcome};
use crate::entities::processed_event::{ClaimOutcome, DeadLetter, EventState, ProcessedEvent};
use crate::entities::redemption::{NewRedemption, OfferRedemption, RedemptionOutcome};
use crate::entities::wallet::{NewLedgerEntry, Wallet, WalletTransaction};
use crate::entities::{EventKind, OrderStatus, OwnerType};

use super::{LedgerApply, Store, StoreError};

#[derive(Default)]
struct Inner {
    events: HashMap<String, ProcessedEvent>,
    orders: HashMap<Uuid, Order>,
    wallets: HashMap<Uuid, Wallet>,
    transactions: Vec<WalletTransaction>,
    tx_index_by_key: HashMap<String, usize>,
    redemptions: HashMap<(Uuid, Uuid), OfferRedemption>,
    boosts: HashMap<Uuid, Boost>,
}

/// Mutex-guarded in-memory storage with the same outcome semantics as
/// [`super::PgStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn now() -> time::OffsetDateTime {
    time::OffsetDateTime::now_utc()
}

fn is_stale(claimed_at: time::OffsetDateTime, stale_after: Duration) -> bool {
    (now() - claimed_at).whole_milliseconds() >= stale_after.as_millis() as i128
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn claim_event(
        &self,
        external_id: &str,
        kind: EventKind,
        payload_hash: &str,
        payload: &serde_json::Value,
        stale_after: Duration,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut inner = self.lock();
        match inner.events.get_mut(external_id) {
            None => {
                inner.events.insert(
                    external_id.to_owned(),
                    ProcessedEvent {
                        external_id: external_id.to_owned(),
                        kind,
                        state: EventState::Pending,
                        payload_hash: payload_hash.to_owned(),
                        payload: Some(payload.clone()),
                        received_at: now(),
                        claimed_at: now(),
                        processed_at: None,
                        parked_at: None,
                        park_reason: None,
                    },
                );
                Ok(ClaimOutcome::Claimed)
            }
            Some(existing) => match existing.state {
                EventState::Processed => Ok(ClaimOutcome::AlreadyProcessed),
                EventState::DeadLetter => Ok(ClaimOutcome::Parked),
                EventState::Pending => {
                    if is_stale(existing.claimed_at, stale_after) {
                        existing.claimed_at = now();
                        existing.payload = Some(payload.clone());
                        Ok(ClaimOutcome::Claimed)
                    } else {
                        Ok(ClaimOutcome::InFlight)
                    }
                }
            },
        }
    }

    async fn mark_event_processed(&self, external_id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(event) = inner.events.get_mut(external_id) {
            event.state = EventState::Processed;
            event.processed_at = Some(now());
            event.payload = None;
        }
        Ok(())
    }

    async fn release_event(&self, external_id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner
            .events
            .get(external_id)
            .is_some_and(|e| e.state == EventState::Pending)
        {
            inner.events.remove(external_id);
        }
        Ok(())
    }

    async fn park_event(&self, external_id: &str, reason: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(event) = inner.events.get_mut(external_id) {
            event.state = EventState::DeadLetter;
            event.parked_at = Some(now());
            event.park_reason = Some(reason.to_owned());
        }
        Ok(())
    }

    async fn reopen_dead_letter(
        &self,
        external_id: &str,
    ) -> Result<Option<DeadLetter>, StoreError> {
        let mut inner = self.lock();
        let Some(event) = inner.events.get_mut(external_id) else {
            return Ok(None);
        };
        if event.state != EventState::DeadLetter {
            return Ok(None);
        }
        let Some(payload) = event.payload.clone() else {
            return Ok(None);
        };
        let dead_letter = DeadLetter {
            external_id: event.external_id.clone(),
            kind: event.kind,
            payload,
            reason: event.park_reason.clone().unwrap_or_default(),
            parked_at: event.parked_at.unwrap_or(event.claimed_at),
        };
        event.state = EventState::Pending;
        event.claimed_at = now();
        event.parked_at = None;
        event.park_reason = None;
        Ok(Some(dead_letter))
    }

    async fn find_event(&self, external_id: &str) -> Result<Option<ProcessedEvent>, StoreError> {
        Ok(self.lock().events.get(external_id).cloned())
    }

    async fn list_dead_letters(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DeadLetter>, StoreError> {
        let inner = self.lock();
        let mut parked: Vec<DeadLetter> = inner
            .events
            .values()
            .filter(|e| e.state == EventState::DeadLetter)
            .filter_map(|e| {
                Some(DeadLetter {
                    external_id: e.external_id.clone(),
                    kind: e.kind,
                    payload: e.payload.clone()?,
                    reason: e.park_reason.clone().unwrap_or_default(),
                    parked_at: e.parked_at.unwrap_or(e.claimed_at),
                })
            })
            .collect();
        parked.sort_by(|a, b| b.parked_at.cmp(&a.parked_at));
        Ok(parked
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut inner = self.lock();
        if let Some(existing) = inner.orders.get(&order.order_id) {
            return Ok(existing.clone());
        }
        let record = Order {
            order_id: order.order_id,
            status: OrderStatus::Pending,
            amount: order.amount,
            provider_payment_ref: None,
            created_at: now(),
            updated_at: now(),
        };
        inner.orders.insert(record.order_id, record.clone());
        Ok(record)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.lock().orders.get(&order_id).cloned())
    }

    async fn transition_order(
        &self,
        lookup: &OrderLookup,
        target: OrderStatus,
        provider_ref: Option<&str>,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut inner = self.lock();
        let order_id = match lookup {
            OrderLookup::ById(id) => Some(*id),
            OrderLookup::ByProviderRef(provider) => inner
                .orders
                .values()
                .find(|o| o.provider_payment_ref.as_deref() == Some(provider.as_str()))
                .map(|o| o.order_id),
        };
        let Some(order) = order_id.and_then(|id| inner.orders.get_mut(&id)) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if order.status == target {
            return Ok(TransitionOutcome::AlreadyInTarget(order.clone()));
        }
        if !order.status.can_transition_to(target) {
            return Ok(TransitionOutcome::Illegal {
                current: order.status,
            });
        }
        order.status = target;
        if let Some(provider) = provider_ref {
            order.provider_payment_ref = Some(provider.to_owned());
        }
        order.updated_at = now();
        Ok(TransitionOutcome::Applied(order.clone()))
    }

    async fn find_or_create_wallet(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        currency: &str,
    ) -> Result<Wallet, StoreError> {
        let mut inner = self.lock();
        if let Some(existing) = inner
            .wallets
            .values()
            .find(|w| w.owner_type == owner_type && w.owner_id == owner_id)
        {
            return Ok(existing.clone());
        }
        let wallet = Wallet {
            wallet_id: Uuid::now_v7(),
            owner_type,
            owner_id,
            currency: currency.to_owned(),
            balance: 0,
            created_at: now(),
        };
        inner.wallets.insert(wallet.wallet_id, wallet.clone());
        Ok(wallet)
    }

    async fn get_wallet(&self, wallet_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        Ok(self.lock().wallets.get(&wallet_id).cloned())
    }

    async fn apply_ledger_entry(
        &self,
        entry: NewLedgerEntry,
        default_owner: (OwnerType, Uuid),
        currency: &str,
    ) -> Result<LedgerApply, StoreError> {
        let mut inner = self.lock();
        let key = entry.idempotency_key();

        if let Some(&index) = inner.tx_index_by_key.get(&key) {
            return Ok(LedgerApply::Duplicate(inner.transactions[index].clone()));
        }

        if !inner.wallets.contains_key(&entry.wallet_id) {
            if entry.amount < 0 {
                return Ok(LedgerApply::WalletNotFound);
            }
            // Lazy creation on first credit.
            let (owner_type, owner_id) = default_owner;
            inner.wallets.insert(
                entry.wallet_id,
                Wallet {
                    wallet_id: entry.wallet_id,
                    owner_type,
                    owner_id,
                    currency: currency.to_owned(),
                    balance: 0,
                    created_at: now(),
                },
            );
        }

        let (balance_after, owner_allows_negative) = {
            let Some(wallet) = inner.wallets.get(&entry.wallet_id) else {
                return Ok(LedgerApply::WalletNotFound);
            };
            (
                wallet.balance + entry.amount,
                wallet.owner_type.allows_negative_balance(),
            )
        };
        if balance_after < 0 && !owner_allows_negative {
            let Some(wallet) = inner.wallets.get(&entry.wallet_id) else {
                return Ok(LedgerApply::WalletNotFound);
            };
            return Ok(LedgerApply::InsufficientFunds {
                balance: wallet.balance,
            });
        }

        if let Some(wallet) = inner.wallets.get_mut(&entry.wallet_id) {
            wallet.balance = balance_after;
        }
        let transaction = WalletTransaction {
            transaction_id: Uuid::now_v7(),
            wallet_id: entry.wallet_id,
            amount: entry.amount,
            ref_type: entry.ref_type,
            ref_id: entry.ref_id,
            purpose: entry.purpose,
            idempotency_key: key.clone(),
            balance_after,
            created_at: now(),
        };
        inner.transactions.push(transaction.clone());
        let index = inner.transactions.len() - 1;
        inner.tx_index_by_key.insert(key, index);
        Ok(LedgerApply::Applied(transaction))
    }

    async fn list_wallets(&self, limit: i64, offset: i64) -> Result<Vec<Wallet>, StoreError> {
        let inner = self.lock();
        let mut wallets: Vec<Wallet> = inner.wallets.values().cloned().collect();
        wallets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(wallets
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn wallet_transactions(
        &self,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<WalletTransaction> = inner
            .transactions
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn record_redemption(
        &self,
        redemption: NewRedemption,
    ) -> Result<RedemptionOutcome, StoreError> {
        let mut inner = self.lock();
        let key = (redemption.offer_id, redemption.user_id);
        if inner.redemptions.contains_key(&key) {
            return Ok(RedemptionOutcome::AlreadyRedeemed);
        }
        inner.redemptions.insert(
            key,
            OfferRedemption {
                offer_id: redemption.offer_id,
                user_id: redemption.user_id,
                meta: redemption.meta,
                created_at: now(),
            },
        );
        Ok(RedemptionOutcome::Recorded)
    }

    async fn create_boost(&self, boost: NewBoost) -> Result<Boost, StoreError> {
        let mut inner = self.lock();
        if let Some(existing) = inner.boosts.get(&boost.boost_id) {
            return Ok(existing.clone());
        }
        let record = Boost {
            boost_id: boost.boost_id,
            scope: boost.scope,
            status: BoostStatus::Pending,
            created_at: now(),
            activated_at: None,
        };
        inner.boosts.insert(record.boost_id, record.clone());
        Ok(record)
    }

    async fn activate_boost(&self, boost_id: Uuid) -> Result<ActivationOutcome, StoreError> {
        let mut inner = self.lock();
        let Some(boost) = inner.boosts.get_mut(&boost_id) else {
            return Ok(ActivationOutcome::NotFound);
        };
        if boost.status == BoostStatus::Active {
            return Ok(ActivationOutcome::AlreadyActive);
        }
        boost.status = BoostStatus::Active;
        boost.activated_at = Some(now());
        Ok(ActivationOutcome::Activated)
    }
}
