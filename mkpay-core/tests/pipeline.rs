//! End-to-end pipeline tests over the in-memory store: signed raw bodies in,
//! settled state out.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use uuid::Uuid;

use mkpay_core::dispatch::Dispatcher;
use mkpay_core::entities::boost::{ActivationOutcome, Boost, BoostScope, NewBoost};
use mkpay_core::entities::order::{NewOrder, Order, OrderLookup, TransitionOutcome};
use mkpay_core::entities::processed_event::{ClaimOutcome, DeadLetter, EventState, ProcessedEvent};
use mkpay_core::entities::redemption::{NewRedemption, RedemptionOutcome};
use mkpay_core::entities::wallet::{NewLedgerEntry, RefType, Wallet, WalletTransaction};
use mkpay_core::entities::{EventKind, OrderStatus, OwnerType};
use mkpay_core::events::{ops_alert_channel, AlertReceiver, OpsAlert};
use mkpay_core::ingest::{IngestError, IngestOutcome, IngestPolicy, IngestionGateway};
use mkpay_core::ledger::{Ledger, LedgerError};
use mkpay_core::store::{LedgerApply, MemoryStore, Store, StoreError};
use mkpay_sdk::objects::{EventEnvelope, EventKind as WireKind, EventObject};
use mkpay_sdk::signature::sign_body;

const SECRET: &[u8] = b"whsec_pipeline_test";

fn fast_policy() -> IngestPolicy {
    IngestPolicy {
        max_attempts: 3,
        effect_timeout: Duration::from_secs(5),
        claim_stale_after: Duration::from_secs(60),
        retry_base_delay: Duration::from_millis(1),
    }
}

fn harness() -> Harness<MemoryStore> {
    harness_with_store(Arc::new(MemoryStore::new()))
}

fn harness_with_store<S: Store + 'static>(store: Arc<S>) -> Harness<S> {
    let shared: Arc<dyn Store> = store.clone();
    let ledger = Ledger::new(shared.clone(), "AED");
    let dispatcher = Dispatcher::new(shared.clone(), ledger);
    let (alert_tx, alerts) = ops_alert_channel();
    let gateway = IngestionGateway::new(shared, dispatcher, SECRET, alert_tx, fast_policy());
    Harness {
        store,
        gateway,
        alerts,
    }
}

struct Harness<S> {
    store: Arc<S>,
    gateway: IngestionGateway,
    alerts: AlertReceiver,
}

fn envelope(
    id: &str,
    kind: WireKind,
    payment_ref: Option<&str>,
    metadata: &[(&str, String)],
) -> EventEnvelope {
    EventEnvelope {
        id: id.to_owned(),
        kind,
        created: 1_700_000_000,
        data: EventObject {
            payment_ref: payment_ref.map(str::to_owned),
            amount: None,
            metadata: metadata
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        },
    }
}

fn signed(envelope: &EventEnvelope) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(envelope).unwrap();
    let header = sign_body(&body, SECRET);
    (body, header)
}

/// The ledger's core invariant: every wallet balance equals the sum of its
/// transactions.
async fn assert_balances_consistent(store: &MemoryStore) {
    for wallet in store.list_wallets(1000, 0).await.unwrap() {
        let sum: i64 = store
            .wallet_transactions(wallet.wallet_id, 1000, 0)
            .await
            .unwrap()
            .iter()
            .map(|t| t.amount)
            .sum();
        assert_eq!(
            wallet.balance, sum,
            "wallet {} balance diverged from its transaction sum",
            wallet.wallet_id
        );
    }
}

#[tokio::test]
async fn concurrent_duplicate_wallet_credit_applies_once() {
    let h = harness();
    let wallet_id = Uuid::now_v7();
    let env = envelope(
        "evt_credit_1",
        WireKind::CheckoutCompleted,
        Some("pi_credit"),
        &[
            ("kind", "wallet_credit".to_owned()),
            ("wallet_id", wallet_id.to_string()),
            ("amount", "500".to_owned()),
        ],
    );
    let (body, header) = signed(&env);

    let (a, b) = tokio::join!(
        h.gateway.accept(&body, &header),
        h.gateway.accept(&body, &header),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    // exactly one delivery settles the event; the other observes the claim
    let processed = [&a, &b]
        .iter()
        .filter(|o| matches!(o, IngestOutcome::Processed(_)))
        .count();
    assert_eq!(processed, 1, "got {a:?} / {b:?}");
    assert!(
        [&a, &b].iter().any(|o| matches!(
            o,
            IngestOutcome::Duplicate | IngestOutcome::InFlight
        )),
        "got {a:?} / {b:?}"
    );

    let wallet = h.store.get_wallet(wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, 500);
    assert_eq!(
        h.store
            .wallet_transactions(wallet_id, 100, 0)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_balances_consistent(&h.store).await;
}

#[tokio::test]
async fn sequential_redelivery_reports_duplicate() {
    let h = harness();
    let wallet_id = Uuid::now_v7();
    let env = envelope(
        "evt_credit_2",
        WireKind::CheckoutCompleted,
        None,
        &[
            ("kind", "wallet_credit".to_owned()),
            ("wallet_id", wallet_id.to_string()),
            ("amount", "250".to_owned()),
        ],
    );
    let (body, header) = signed(&env);

    assert!(matches!(
        h.gateway.accept(&body, &header).await.unwrap(),
        IngestOutcome::Processed(_)
    ));
    assert!(matches!(
        h.gateway.accept(&body, &header).await.unwrap(),
        IngestOutcome::Duplicate
    ));
    let wallet = h.store.get_wallet(wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, 250);
}

#[tokio::test]
async fn payment_failed_after_success_leaves_order_succeeded() {
    let h = harness();
    let order = h
        .store
        .create_order(NewOrder {
            order_id: Uuid::now_v7(),
            amount: 4200,
        })
        .await
        .unwrap();

    let success = envelope(
        "evt_ok",
        WireKind::CheckoutCompleted,
        Some("pi_flip"),
        &[("order_id", order.order_id.to_string())],
    );
    let (body, header) = signed(&success);
    assert!(matches!(
        h.gateway.accept(&body, &header).await.unwrap(),
        IngestOutcome::Processed(_)
    ));

    // late failure delivery for the same payment: skipped, not applied
    let failure = envelope("evt_late_fail", WireKind::PaymentFailed, Some("pi_flip"), &[]);
    let (body, header) = signed(&failure);
    let outcome = h.gateway.accept(&body, &header).await.unwrap();
    assert!(matches!(outcome, IngestOutcome::Processed(_)));

    let order = h.store.get_order(order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Succeeded);

    // the skip still counts the failure event as processed
    let marker = h.store.find_event("evt_late_fail").await.unwrap().unwrap();
    assert_eq!(marker.state, EventState::Processed);
}

#[tokio::test]
async fn refund_follows_success_and_is_terminal() {
    let h = harness();
    let order = h
        .store
        .create_order(NewOrder {
            order_id: Uuid::now_v7(),
            amount: 100,
        })
        .await
        .unwrap();

    let success = envelope(
        "evt_r_ok",
        WireKind::CheckoutCompleted,
        Some("pi_r"),
        &[("order_id", order.order_id.to_string())],
    );
    let (body, header) = signed(&success);
    h.gateway.accept(&body, &header).await.unwrap();

    let refund = envelope("evt_refund", WireKind::ChargeRefunded, Some("pi_r"), &[]);
    let (body, header) = signed(&refund);
    assert!(matches!(
        h.gateway.accept(&body, &header).await.unwrap(),
        IngestOutcome::Processed(_)
    ));
    let current = h.store.get_order(order.order_id).await.unwrap().unwrap();
    assert_eq!(current.status, OrderStatus::Refunded);

    // a late success redelivery cannot resurrect a refunded order
    let late = envelope(
        "evt_r_late",
        WireKind::CheckoutCompleted,
        Some("pi_r"),
        &[("order_id", order.order_id.to_string())],
    );
    let (body, header) = signed(&late);
    h.gateway.accept(&body, &header).await.unwrap();
    let current = h.store.get_order(order.order_id).await.unwrap().unwrap();
    assert_eq!(current.status, OrderStatus::Refunded);
}

#[tokio::test]
async fn offer_redemption_once_per_offer_and_user() {
    let h = harness();
    let offer_id = Uuid::now_v7();
    let user_id = Uuid::now_v7();
    let meta = [
        ("type", "offer_purchase".to_owned()),
        ("offer_id", offer_id.to_string()),
        ("user_id", user_id.to_string()),
    ];

    // two distinct provider events for the same (offer, user)
    let first = envelope("evt_offer_1", WireKind::CheckoutCompleted, Some("pi_o1"), &meta);
    let (body, header) = signed(&first);
    assert!(matches!(
        h.gateway.accept(&body, &header).await.unwrap(),
        IngestOutcome::Processed(_)
    ));

    let second = envelope("evt_offer_2", WireKind::CheckoutCompleted, Some("pi_o2"), &meta);
    let (body, header) = signed(&second);
    let IngestOutcome::Processed(summary) = h.gateway.accept(&body, &header).await.unwrap()
    else {
        panic!("second event should still settle");
    };
    assert!(summary.describe().contains("offer_redemption=already_applied"));
}

#[tokio::test]
async fn overdraft_debit_fails_and_leaves_no_row() {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn Store> = store.clone();
    let ledger = Ledger::new(shared, "AED");
    let user_id = Uuid::now_v7();

    let wallet = ledger
        .resolve_wallet(OwnerType::User, user_id)
        .await
        .unwrap();
    ledger
        .credit(
            wallet.wallet_id,
            100,
            RefType::AdminAdjustment,
            &Uuid::now_v7().to_string(),
            "seed",
            Some((OwnerType::User, user_id)),
        )
        .await
        .unwrap();

    let err = ledger
        .debit(
            wallet.wallet_id,
            150,
            RefType::AdminAdjustment,
            &Uuid::now_v7().to_string(),
            "overdraft_attempt",
        )
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

    let wallet = store.get_wallet(wallet.wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, 100);
    // the refused debit left no transaction behind
    assert_eq!(
        store
            .wallet_transactions(wallet.wallet_id, 100, 0)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_balances_consistent(&store).await;
}

#[tokio::test]
async fn invalid_signature_changes_nothing() {
    let h = harness();
    let wallet_id = Uuid::now_v7();
    let env = envelope(
        "evt_forged",
        WireKind::CheckoutCompleted,
        None,
        &[
            ("kind", "wallet_credit".to_owned()),
            ("wallet_id", wallet_id.to_string()),
            ("amount", "9999".to_owned()),
        ],
    );
    let body = serde_json::to_vec(&env).unwrap();
    let header = sign_body(&body, b"not_the_shared_secret");

    let err = h.gateway.accept(&body, &header).await.unwrap_err();
    assert!(matches!(err, IngestError::Authentication(_)));

    assert!(h.store.find_event("evt_forged").await.unwrap().is_none());
    assert!(h.store.get_wallet(wallet_id).await.unwrap().is_none());
}

#[tokio::test]
async fn tampered_body_is_rejected() {
    let h = harness();
    let env = envelope("evt_tamper", WireKind::CheckoutCompleted, None, &[]);
    let (body, header) = signed(&env);
    let mut tampered = body.clone();
    let last = tampered.len() - 2;
    tampered[last] ^= 0x01;

    let err = h.gateway.accept(&tampered, &header).await.unwrap_err();
    assert!(matches!(err, IngestError::Authentication(_)));
    assert!(h.store.find_event("evt_tamper").await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_metadata_rejected_before_any_claim() {
    let h = harness();
    let env = envelope(
        "evt_bad_meta",
        WireKind::CheckoutCompleted,
        None,
        &[
            ("kind", "wallet_credit".to_owned()),
            ("wallet_id", "not-a-uuid".to_owned()),
            ("amount", "100".to_owned()),
        ],
    );
    let (body, header) = signed(&env);

    let err = h.gateway.accept(&body, &header).await.unwrap_err();
    assert!(matches!(err, IngestError::Metadata(_)));
    assert!(h.store.find_event("evt_bad_meta").await.unwrap().is_none());
}

#[tokio::test]
async fn legacy_topup_credits_user_wallet() {
    let h = harness();
    let user_id = Uuid::now_v7();
    let env = envelope(
        "evt_legacy",
        WireKind::CheckoutCompleted,
        Some("pi_legacy"),
        &[
            ("user_id", user_id.to_string()),
            ("amount", "1500".to_owned()),
            ("description", "Wallet top up - 15 AED".to_owned()),
        ],
    );
    let (body, header) = signed(&env);
    assert!(matches!(
        h.gateway.accept(&body, &header).await.unwrap(),
        IngestOutcome::Processed(_)
    ));

    let wallet = h
        .store
        .find_or_create_wallet(OwnerType::User, user_id, "AED")
        .await
        .unwrap();
    assert_eq!(wallet.balance, 1500);
    assert_balances_consistent(&h.store).await;
}

#[tokio::test]
async fn boost_checkout_transitions_order_and_activates_boost() {
    let h = harness();
    let order = h
        .store
        .create_order(NewOrder {
            order_id: Uuid::now_v7(),
            amount: 2000,
        })
        .await
        .unwrap();
    let boost = h
        .store
        .create_boost(NewBoost {
            boost_id: Uuid::now_v7(),
            scope: BoostScope::Marketplace,
        })
        .await
        .unwrap();

    let env = envelope(
        "evt_boost",
        WireKind::CheckoutCompleted,
        Some("pi_boost"),
        &[
            ("kind", "boost_marketplace".to_owned()),
            ("order_id", order.order_id.to_string()),
            ("boost_id", boost.boost_id.to_string()),
        ],
    );
    let (body, header) = signed(&env);
    assert!(matches!(
        h.gateway.accept(&body, &header).await.unwrap(),
        IngestOutcome::Processed(_)
    ));

    let order = h.store.get_order(order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Succeeded);
    assert!(matches!(
        h.store.activate_boost(boost.boost_id).await.unwrap(),
        ActivationOutcome::AlreadyActive
    ));
}

// ---------------------------------------------------------------------
// Fault injection: a store whose boost activation fails N times, to drive
// the retry and dead-letter paths.

struct FlakyStore {
    inner: MemoryStore,
    activation_failures: AtomicU32,
}

impl FlakyStore {
    fn failing(times: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            activation_failures: AtomicU32::new(times),
        }
    }

    fn heal(&self) {
        self.activation_failures.store(0, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Store for FlakyStore {
    async fn claim_event(
        &self,
        external_id: &str,
        kind: EventKind,
        payload_hash: &str,
        payload: &serde_json::Value,
        stale_after: Duration,
    ) -> Result<ClaimOutcome, StoreError> {
        self.inner
            .claim_event(external_id, kind, payload_hash, payload, stale_after)
            .await
    }

    async fn mark_event_processed(&self, external_id: &str) -> Result<(), StoreError> {
        self.inner.mark_event_processed(external_id).await
    }

    async fn release_event(&self, external_id: &str) -> Result<(), StoreError> {
        self.inner.release_event(external_id).await
    }

    async fn park_event(&self, external_id: &str, reason: &str) -> Result<(), StoreError> {
        self.inner.park_event(external_id, reason).await
    }

    async fn reopen_dead_letter(
        &self,
        external_id: &str,
    ) -> Result<Option<DeadLetter>, StoreError> {
        self.inner.reopen_dead_letter(external_id).await
    }

    async fn find_event(&self, external_id: &str) -> Result<Option<ProcessedEvent>, StoreError> {
        self.inner.find_event(external_id).await
    }

    async fn list_dead_letters(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DeadLetter>, StoreError> {
        self.inner.list_dead_letters(limit, offset).await
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.inner.create_order(order).await
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        self.inner.get_order(order_id).await
    }

    async fn transition_order(
        &self,
        lookup: &OrderLookup,
        target: OrderStatus,
        provider_ref: Option<&str>,
    ) -> Result<TransitionOutcome, StoreError> {
        self.inner.transition_order(lookup, target, provider_ref).await
    }

    async fn find_or_create_wallet(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        currency: &str,
    ) -> Result<Wallet, StoreError> {
        self.inner
            .find_or_create_wallet(owner_type, owner_id, currency)
            .await
    }

    async fn get_wallet(&self, wallet_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        self.inner.get_wallet(wallet_id).await
    }

    async fn apply_ledger_entry(
        &self,
        entry: NewLedgerEntry,
        default_owner: (OwnerType, Uuid),
        currency: &str,
    ) -> Result<LedgerApply, StoreError> {
        self.inner
            .apply_ledger_entry(entry, default_owner, currency)
            .await
    }

    async fn list_wallets(&self, limit: i64, offset: i64) -> Result<Vec<Wallet>, StoreError> {
        self.inner.list_wallets(limit, offset).await
    }

    async fn wallet_transactions(
        &self,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, StoreError> {
        self.inner.wallet_transactions(wallet_id, limit, offset).await
    }

    async fn record_redemption(
        &self,
        redemption: NewRedemption,
    ) -> Result<RedemptionOutcome, StoreError> {
        self.inner.record_redemption(redemption).await
    }

    async fn create_boost(&self, boost: NewBoost) -> Result<Boost, StoreError> {
        self.inner.create_boost(boost).await
    }

    async fn activate_boost(&self, boost_id: Uuid) -> Result<ActivationOutcome, StoreError> {
        if self.activation_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            n.checked_sub(1)
        })
        .is_ok()
        {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.activate_boost(boost_id).await
    }
}

#[tokio::test]
async fn transient_storage_fault_is_retried_within_budget() {
    let store = Arc::new(FlakyStore::failing(0));
    let h = harness_with_store(store.clone());
    let boost = store
        .create_boost(NewBoost {
            boost_id: Uuid::now_v7(),
            scope: BoostScope::Garage,
        })
        .await
        .unwrap();
    store.activation_failures.store(1, Ordering::SeqCst);

    let env = envelope(
        "evt_flaky",
        WireKind::CheckoutCompleted,
        None,
        &[
            ("kind", "boost_garage".to_owned()),
            ("boost_id", boost.boost_id.to_string()),
        ],
    );
    let (body, header) = signed(&env);
    // one transient fault, then the retry succeeds
    assert!(matches!(
        h.gateway.accept(&body, &header).await.unwrap(),
        IngestOutcome::Processed(_)
    ));
    assert!(matches!(
        store.activate_boost(boost.boost_id).await.unwrap(),
        ActivationOutcome::AlreadyActive
    ));
}

#[tokio::test]
async fn exhausted_retries_park_the_event_and_replay_recovers_it() {
    let store = Arc::new(FlakyStore::failing(0));
    let mut h = harness_with_store(store.clone());
    let boost = store
        .create_boost(NewBoost {
            boost_id: Uuid::now_v7(),
            scope: BoostScope::Marketplace,
        })
        .await
        .unwrap();
    store.activation_failures.store(u32::MAX, Ordering::SeqCst);

    let env = envelope(
        "evt_doomed",
        WireKind::CheckoutCompleted,
        None,
        &[
            ("kind", "boost_marketplace".to_owned()),
            ("boost_id", boost.boost_id.to_string()),
        ],
    );
    let (body, header) = signed(&env);

    let outcome = h.gateway.accept(&body, &header).await.unwrap();
    assert!(matches!(outcome, IngestOutcome::Parked { .. }), "got {outcome:?}");

    let marker = store.find_event("evt_doomed").await.unwrap().unwrap();
    assert_eq!(marker.state, EventState::DeadLetter);
    assert!(matches!(
        h.alerts.recv().await,
        Some(OpsAlert::EventParked { .. })
    ));
    assert_eq!(store.list_dead_letters(10, 0).await.unwrap().len(), 1);

    // redelivery of a parked event does nothing
    let redelivered = h.gateway.accept(&body, &header).await.unwrap();
    assert!(matches!(redelivered, IngestOutcome::AlreadyParked));

    // operator fixes the fault and replays
    store.heal();
    let replayed = h.gateway.retry_parked("evt_doomed").await.unwrap().unwrap();
    assert!(matches!(replayed, IngestOutcome::Processed(_)), "got {replayed:?}");
    let marker = store.find_event("evt_doomed").await.unwrap().unwrap();
    assert_eq!(marker.state, EventState::Processed);
    assert!(matches!(
        store.activate_boost(boost.boost_id).await.unwrap(),
        ActivationOutcome::AlreadyActive
    ));
}

#[tokio::test]
async fn replay_of_unknown_event_returns_none() {
    let h = harness();
    assert!(h.gateway.retry_parked("evt_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn payment_succeeded_commits_with_no_side_effects() {
    let h = harness();
    let env = envelope(
        "evt_info_1",
        WireKind::PaymentSucceeded,
        Some("pi_info"),
        &[],
    );
    let (body, header) = signed(&env);

    let outcome = h.gateway.accept(&body, &header).await.unwrap();
    let IngestOutcome::Processed(summary) = outcome else {
        panic!("got {outcome:?}");
    };
    assert!(summary.effects.is_empty());

    // durably deduplicated like any other event
    let marker = h.store.find_event("evt_info_1").await.unwrap().unwrap();
    assert_eq!(marker.state, EventState::Processed);
    assert!(matches!(
        h.gateway.accept(&body, &header).await.unwrap(),
        IngestOutcome::Duplicate
    ));

    // no orders, wallets, or ledger rows came into existence
    assert!(h.store.list_wallets(10, 0).await.unwrap().is_empty());
    assert!(h.store.list_dead_letters(10, 0).await.unwrap().is_empty());
}
