//! Applies the side effects a decoded intent calls for.
//!
//! Each effect is idempotent on its own (conditional transitions, keyed
//! ledger entries, primary-keyed redemptions), so a partially-applied event
//! can be re-dispatched from the top after a failure: already-applied
//! effects report [`EffectOutcome::AlreadyApplied`] and the rest proceed.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::entities::OwnerType;
use crate::entities::boost::ActivationOutcome;
use crate::entities::order::{OrderLookup, TransitionOutcome};
use crate::entities::redemption::{NewRedemption, RedemptionOutcome};
use crate::entities::wallet::RefType;
use crate::entities::OrderStatus;
use crate::ledger::{Ledger, LedgerError};
use crate::store::{Store, StoreError};

use super::intent::{CheckoutPurpose, EventIntent};

/// The distinct side-effect families an event can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    OrderTransition,
    BoostActivation,
    WalletCredit,
    OfferRedemption,
}

impl SideEffect {
    pub fn as_str(self) -> &'static str {
        match self {
            SideEffect::OrderTransition => "order_transition",
            SideEffect::BoostActivation => "boost_activation",
            SideEffect::WalletCredit => "wallet_credit",
            SideEffect::OfferRedemption => "offer_redemption",
        }
    }
}

/// How one side effect resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectOutcome {
    Applied,
    /// A prior delivery already applied this effect; no state changed.
    AlreadyApplied,
    /// The effect could not legally apply (illegal transition, missing
    /// target row); logged and not retried.
    Skipped(String),
}

/// Per-effect record of one dispatch pass.
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub effects: Vec<(SideEffect, EffectOutcome)>,
}

impl DispatchSummary {
    fn record(&mut self, effect: SideEffect, outcome: EffectOutcome) {
        self.effects.push((effect, outcome));
    }

    /// Short human-readable rendering for logs and admin responses.
    pub fn describe(&self) -> String {
        if self.effects.is_empty() {
            return "no side effects".to_owned();
        }
        self.effects
            .iter()
            .map(|(effect, outcome)| match outcome {
                EffectOutcome::Applied => format!("{}=applied", effect.as_str()),
                EffectOutcome::AlreadyApplied => format!("{}=already_applied", effect.as_str()),
                EffectOutcome::Skipped(reason) => {
                    format!("{}=skipped({reason})", effect.as_str())
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Failure of a dispatch pass. Skips are not failures; only errors that
/// leave the event incompletely applied surface here.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl DispatchError {
    /// Whether a retry of the whole dispatch could plausibly succeed.
    /// Insufficient funds cannot resolve by retrying; storage faults can.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Storage(_) => true,
            DispatchError::Ledger(LedgerError::Storage(_)) => true,
            DispatchError::Ledger(_) => false,
        }
    }
}

/// Walks a decoded intent through its side effects in a fixed order:
/// order transition first, then the purchase-specific effect.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn Store>,
    ledger: Ledger,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, ledger: Ledger) -> Self {
        Self { store, ledger }
    }

    /// Apply every side effect of `intent`. `external_id` is the event's
    /// dedup identity, reused as the ledger reference for event-scoped
    /// credits.
    pub async fn dispatch(
        &self,
        external_id: &str,
        intent: &EventIntent,
    ) -> Result<DispatchSummary, DispatchError> {
        let mut summary = DispatchSummary::default();
        match intent {
            EventIntent::Checkout {
                order_id,
                payment_ref,
                purpose,
            } => {
                let lookup = order_lookup(*order_id, payment_ref.as_deref());
                if let Some(lookup) = &lookup {
                    let outcome = self
                        .transition(external_id, lookup, OrderStatus::Succeeded, payment_ref.as_deref())
                        .await?;
                    summary.record(SideEffect::OrderTransition, outcome);
                }
                self.apply_purpose(external_id, *order_id, payment_ref.as_deref(), purpose, &mut summary)
                    .await?;
            }
            EventIntent::PaymentFailed { payment_ref } => {
                self.terminal_transition(
                    external_id,
                    payment_ref.as_deref(),
                    OrderStatus::Failed,
                    &mut summary,
                )
                .await?;
            }
            EventIntent::ChargeRefunded { payment_ref } => {
                self.terminal_transition(
                    external_id,
                    payment_ref.as_deref(),
                    OrderStatus::Refunded,
                    &mut summary,
                )
                .await?;
            }
            EventIntent::Informational => {}
        }
        Ok(summary)
    }

    async fn apply_purpose(
        &self,
        external_id: &str,
        order_id: Option<Uuid>,
        payment_ref: Option<&str>,
        purpose: &CheckoutPurpose,
        summary: &mut DispatchSummary,
    ) -> Result<(), DispatchError> {
        match purpose {
            CheckoutPurpose::OrderOnly => {}
            CheckoutPurpose::Boost { boost_id, .. } => {
                let outcome = match self.store.activate_boost(*boost_id).await? {
                    ActivationOutcome::Activated => EffectOutcome::Applied,
                    ActivationOutcome::AlreadyActive => EffectOutcome::AlreadyApplied,
                    ActivationOutcome::NotFound => {
                        warn!(
                            external_id,
                            boost_id = %boost_id,
                            "boost named by paid event does not exist; skipping activation"
                        );
                        EffectOutcome::Skipped("boost not found".to_owned())
                    }
                };
                summary.record(SideEffect::BoostActivation, outcome);
            }
            CheckoutPurpose::WalletCredit { wallet_id, amount } => {
                // Credits are keyed on the order when one exists, so a
                // re-created session paying the same order cannot double
                // credit; event-scoped otherwise.
                let (ref_type, ref_id) = match order_id {
                    Some(order_id) => (RefType::Order, order_id.to_string()),
                    None => (RefType::ExternalEvent, external_id.to_owned()),
                };
                let receipt = self
                    .ledger
                    .credit(*wallet_id, *amount, ref_type, &ref_id, "wallet_credit", None)
                    .await?;
                summary.record(
                    SideEffect::WalletCredit,
                    if receipt.duplicate {
                        EffectOutcome::AlreadyApplied
                    } else {
                        EffectOutcome::Applied
                    },
                );
            }
            CheckoutPurpose::OfferPurchase { offer_id, user_id } => {
                let redemption = NewRedemption {
                    offer_id: *offer_id,
                    user_id: *user_id,
                    meta: serde_json::json!({
                        "external_id": external_id,
                        "payment_ref": payment_ref,
                    }),
                };
                let outcome = match self.store.record_redemption(redemption).await? {
                    RedemptionOutcome::Recorded => EffectOutcome::Applied,
                    RedemptionOutcome::AlreadyRedeemed => EffectOutcome::AlreadyApplied,
                };
                summary.record(SideEffect::OfferRedemption, outcome);
            }
            CheckoutPurpose::LegacyTopUp { user_id, amount } => {
                let wallet = self
                    .ledger
                    .resolve_wallet(OwnerType::User, *user_id)
                    .await?;
                let receipt = self
                    .ledger
                    .credit(
                        wallet.wallet_id,
                        *amount,
                        RefType::ExternalEvent,
                        external_id,
                        "wallet_topup",
                        Some((OwnerType::User, *user_id)),
                    )
                    .await?;
                summary.record(
                    SideEffect::WalletCredit,
                    if receipt.duplicate {
                        EffectOutcome::AlreadyApplied
                    } else {
                        EffectOutcome::Applied
                    },
                );
            }
        }
        Ok(())
    }

    async fn terminal_transition(
        &self,
        external_id: &str,
        payment_ref: Option<&str>,
        target: OrderStatus,
        summary: &mut DispatchSummary,
    ) -> Result<(), DispatchError> {
        let Some(payment_ref) = payment_ref else {
            warn!(
                external_id,
                ?target,
                "event names no payment reference; cannot locate order"
            );
            summary.record(
                SideEffect::OrderTransition,
                EffectOutcome::Skipped("no payment reference".to_owned()),
            );
            return Ok(());
        };
        let lookup = OrderLookup::ByProviderRef(payment_ref.to_owned());
        let outcome = self.transition(external_id, &lookup, target, None).await?;
        summary.record(SideEffect::OrderTransition, outcome);
        Ok(())
    }

    async fn transition(
        &self,
        external_id: &str,
        lookup: &OrderLookup,
        target: OrderStatus,
        provider_ref: Option<&str>,
    ) -> Result<EffectOutcome, DispatchError> {
        match self.store.transition_order(lookup, target, provider_ref).await? {
            TransitionOutcome::Applied(_) => Ok(EffectOutcome::Applied),
            TransitionOutcome::AlreadyInTarget(_) => Ok(EffectOutcome::AlreadyApplied),
            TransitionOutcome::Illegal { current } => {
                warn!(
                    external_id,
                    %lookup,
                    ?current,
                    ?target,
                    "illegal order transition requested by event; skipping"
                );
                Ok(EffectOutcome::Skipped(format!(
                    "illegal transition {current:?} -> {target:?}"
                )))
            }
            TransitionOutcome::NotFound => {
                warn!(external_id, %lookup, "event references an unknown order");
                Ok(EffectOutcome::Skipped("order not found".to_owned()))
            }
        }
    }
}

fn order_lookup(order_id: Option<Uuid>, payment_ref: Option<&str>) -> Option<OrderLookup> {
    match (order_id, payment_ref) {
        (Some(id), _) => Some(OrderLookup::ById(id)),
        (None, Some(r)) => Some(OrderLookup::ByProviderRef(r.to_owned())),
        (None, None) => None,
    }
}
