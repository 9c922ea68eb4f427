//! Typed event intents decoded from the provider's metadata map.

use mkpay_sdk::objects::{EventEnvelope, EventKind};
use uuid::Uuid;

use crate::entities::boost::BoostScope;

/// Errors from decoding an envelope's metadata into an intent.
///
/// These are parsing failures: they surface to the provider as a 400 before
/// any state change, the same as a malformed body.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("metadata field `{0}` is required for this event but missing")]
    MissingField(&'static str),
    #[error("metadata field `{0}` is not a valid uuid")]
    InvalidUuid(&'static str),
    #[error("metadata field `{0}` is not a positive integer amount")]
    InvalidAmount(&'static str),
}

/// What a `checkout_completed` event pays for, beyond the order itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutPurpose {
    /// No extra side effect; only the order transition applies.
    OrderOnly,
    /// Activate a marketplace or garage boost.
    Boost { boost_id: Uuid, scope: BoostScope },
    /// Credit a named wallet by a stated amount.
    WalletCredit { wallet_id: Uuid, amount: i64 },
    /// Record an offer redemption for a user.
    OfferPurchase { offer_id: Uuid, user_id: Uuid },
    /// Legacy top-up inferred from a description substring; resolves or
    /// creates the user's wallet before crediting it.
    LegacyTopUp { user_id: Uuid, amount: i64 },
}

/// A fully decoded inbound event, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventIntent {
    Checkout {
        order_id: Option<Uuid>,
        payment_ref: Option<String>,
        purpose: CheckoutPurpose,
    },
    /// Transition the order found by provider payment reference to `failed`.
    PaymentFailed { payment_ref: Option<String> },
    /// Transition the order found by provider payment reference to `refunded`.
    ChargeRefunded { payment_ref: Option<String> },
    /// Durably marked processed, no side effects.
    Informational,
}

impl EventIntent {
    /// Decode an envelope's declared kind and metadata into a typed intent.
    pub fn decode(envelope: &EventEnvelope) -> Result<Self, IntentError> {
        match envelope.kind {
            EventKind::CheckoutCompleted => Ok(EventIntent::Checkout {
                order_id: opt_uuid(envelope, "order_id")?,
                payment_ref: envelope.data.payment_ref.clone(),
                purpose: decode_purpose(envelope)?,
            }),
            EventKind::PaymentFailed => Ok(EventIntent::PaymentFailed {
                payment_ref: envelope.data.payment_ref.clone(),
            }),
            EventKind::ChargeRefunded => Ok(EventIntent::ChargeRefunded {
                payment_ref: envelope.data.payment_ref.clone(),
            }),
            EventKind::PaymentSucceeded => Ok(EventIntent::Informational),
        }
    }
}

fn decode_purpose(envelope: &EventEnvelope) -> Result<CheckoutPurpose, IntentError> {
    // `kind` is the modern discriminator; `type` is the legacy spelling some
    // older checkout flows still attach for offer purchases.
    let declared = envelope.meta("kind").or_else(|| {
        envelope
            .meta("type")
            .filter(|t| *t == "offer_purchase")
    });

    match declared {
        Some("boost_marketplace") => Ok(CheckoutPurpose::Boost {
            boost_id: req_uuid(envelope, "boost_id")?,
            scope: BoostScope::Marketplace,
        }),
        Some("boost_garage") => Ok(CheckoutPurpose::Boost {
            boost_id: req_uuid(envelope, "boost_id")?,
            scope: BoostScope::Garage,
        }),
        Some("wallet_credit") => Ok(CheckoutPurpose::WalletCredit {
            wallet_id: req_uuid(envelope, "wallet_id")?,
            amount: req_amount(envelope, "amount")?,
        }),
        Some("offer_purchase") => Ok(CheckoutPurpose::OfferPurchase {
            offer_id: req_uuid(envelope, "offer_id")?,
            user_id: req_uuid(envelope, "user_id")?,
        }),
        Some(_) | None => {
            // Legacy top-up detection: no recognized kind, but a user, an
            // amount, and a description that names a wallet purpose.
            // Substring matching on free text is inherently ambiguous; it is
            // kept only for old checkout flows, and flagged loudly.
            let wallet_description = envelope
                .meta("description")
                .is_some_and(|d| d.to_lowercase().contains("wallet"));
            if declared.is_none()
                && wallet_description
                && envelope.meta("user_id").is_some()
                && envelope.meta("amount").is_some()
            {
                tracing::warn!(
                    event_id = %envelope.id,
                    "legacy description-based top-up detection triggered"
                );
                return Ok(CheckoutPurpose::LegacyTopUp {
                    user_id: req_uuid(envelope, "user_id")?,
                    amount: req_amount(envelope, "amount")?,
                });
            }
            Ok(CheckoutPurpose::OrderOnly)
        }
    }
}

fn opt_uuid(envelope: &EventEnvelope, field: &'static str) -> Result<Option<Uuid>, IntentError> {
    envelope
        .meta(field)
        .map(|raw| Uuid::parse_str(raw).map_err(|_| IntentError::InvalidUuid(field)))
        .transpose()
}

fn req_uuid(envelope: &EventEnvelope, field: &'static str) -> Result<Uuid, IntentError> {
    opt_uuid(envelope, field)?.ok_or(IntentError::MissingField(field))
}

fn req_amount(envelope: &EventEnvelope, field: &'static str) -> Result<i64, IntentError> {
    let raw = envelope
        .meta(field)
        .ok_or(IntentError::MissingField(field))?;
    let amount: i64 = raw.parse().map_err(|_| IntentError::InvalidAmount(field))?;
    if amount <= 0 {
        return Err(IntentError::InvalidAmount(field));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mkpay_sdk::objects::EventObject;
    use std::collections::BTreeMap;

    fn envelope(kind: EventKind, metadata: &[(&str, String)]) -> EventEnvelope {
        EventEnvelope {
            id: "evt_test".to_owned(),
            kind,
            created: 0,
            data: EventObject {
                payment_ref: Some("pi_1".to_owned()),
                amount: None,
                metadata: metadata
                    .iter()
                    .map(|(k, v)| ((*k).to_owned(), v.clone()))
                    .collect::<BTreeMap<_, _>>(),
            },
        }
    }

    #[test]
    fn bare_checkout_is_order_only() {
        let order_id = Uuid::now_v7();
        let env = envelope(
            EventKind::CheckoutCompleted,
            &[("order_id", order_id.to_string())],
        );
        let intent = EventIntent::decode(&env).unwrap();
        assert_eq!(
            intent,
            EventIntent::Checkout {
                order_id: Some(order_id),
                payment_ref: Some("pi_1".to_owned()),
                purpose: CheckoutPurpose::OrderOnly,
            }
        );
    }

    #[test]
    fn wallet_credit_requires_wallet_and_amount() {
        let wallet_id = Uuid::now_v7();
        let env = envelope(
            EventKind::CheckoutCompleted,
            &[
                ("kind", "wallet_credit".to_owned()),
                ("wallet_id", wallet_id.to_string()),
                ("amount", "500".to_owned()),
            ],
        );
        let EventIntent::Checkout { purpose, .. } = EventIntent::decode(&env).unwrap() else {
            panic!("expected checkout intent");
        };
        assert_eq!(purpose, CheckoutPurpose::WalletCredit { wallet_id, amount: 500 });

        let missing_amount = envelope(
            EventKind::CheckoutCompleted,
            &[
                ("kind", "wallet_credit".to_owned()),
                ("wallet_id", wallet_id.to_string()),
            ],
        );
        assert!(matches!(
            EventIntent::decode(&missing_amount).unwrap_err(),
            IntentError::MissingField("amount")
        ));
    }

    #[test]
    fn non_positive_amount_rejected() {
        let env = envelope(
            EventKind::CheckoutCompleted,
            &[
                ("kind", "wallet_credit".to_owned()),
                ("wallet_id", Uuid::now_v7().to_string()),
                ("amount", "0".to_owned()),
            ],
        );
        assert!(matches!(
            EventIntent::decode(&env).unwrap_err(),
            IntentError::InvalidAmount("amount")
        ));
    }

    #[test]
    fn legacy_type_field_still_routes_offer_purchase() {
        let offer_id = Uuid::now_v7();
        let user_id = Uuid::now_v7();
        let env = envelope(
            EventKind::CheckoutCompleted,
            &[
                ("type", "offer_purchase".to_owned()),
                ("offer_id", offer_id.to_string()),
                ("user_id", user_id.to_string()),
            ],
        );
        let EventIntent::Checkout { purpose, .. } = EventIntent::decode(&env).unwrap() else {
            panic!("expected checkout intent");
        };
        assert_eq!(purpose, CheckoutPurpose::OfferPurchase { offer_id, user_id });
    }

    #[test]
    fn legacy_topup_detected_by_description() {
        let user_id = Uuid::now_v7();
        let env = envelope(
            EventKind::CheckoutCompleted,
            &[
                ("user_id", user_id.to_string()),
                ("amount", "1000".to_owned()),
                ("description", "Wallet top-up via checkout".to_owned()),
            ],
        );
        let EventIntent::Checkout { purpose, .. } = EventIntent::decode(&env).unwrap() else {
            panic!("expected checkout intent");
        };
        assert_eq!(purpose, CheckoutPurpose::LegacyTopUp { user_id, amount: 1000 });
    }

    #[test]
    fn description_without_wallet_word_is_order_only() {
        let env = envelope(
            EventKind::CheckoutCompleted,
            &[
                ("user_id", Uuid::now_v7().to_string()),
                ("amount", "1000".to_owned()),
                ("description", "Sticker pack".to_owned()),
            ],
        );
        let EventIntent::Checkout { purpose, .. } = EventIntent::decode(&env).unwrap() else {
            panic!("expected checkout intent");
        };
        assert_eq!(purpose, CheckoutPurpose::OrderOnly);
    }

    #[test]
    fn unrecognized_kind_falls_back_to_order_only() {
        let env = envelope(
            EventKind::CheckoutCompleted,
            &[("kind", "mystery_purchase".to_owned())],
        );
        let EventIntent::Checkout { purpose, .. } = EventIntent::decode(&env).unwrap() else {
            panic!("expected checkout intent");
        };
        assert_eq!(purpose, CheckoutPurpose::OrderOnly);
    }

    #[test]
    fn failure_and_refund_events_carry_payment_ref() {
        let failed = envelope(EventKind::PaymentFailed, &[]);
        assert_eq!(
            EventIntent::decode(&failed).unwrap(),
            EventIntent::PaymentFailed {
                payment_ref: Some("pi_1".to_owned())
            }
        );
        let refunded = envelope(EventKind::ChargeRefunded, &[]);
        assert_eq!(
            EventIntent::decode(&refunded).unwrap(),
            EventIntent::ChargeRefunded {
                payment_ref: Some("pi_1".to_owned())
            }
        );
    }

    #[test]
    fn payment_succeeded_is_informational() {
        let env = envelope(EventKind::PaymentSucceeded, &[]);
        assert_eq!(EventIntent::decode(&env).unwrap(), EventIntent::Informational);
    }
}
