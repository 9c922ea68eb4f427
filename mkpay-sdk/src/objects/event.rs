//! Inbound webhook event envelope.
//!
//! This is the wire shape the payment provider delivers to
//! `POST /webhook/payments`. The envelope carries a provider-assigned,
//! globally unique `id` used for deduplication, a declared `kind`, and a
//! free-form string `metadata` map that the core decodes *once* into a
//! typed intent at the ingestion boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared kind of an inbound provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A checkout flow finished successfully. Authoritative success signal;
    /// carries the metadata that selects the side effect.
    CheckoutCompleted,
    /// The underlying payment failed.
    PaymentFailed,
    /// A settled charge was refunded.
    ChargeRefunded,
    /// Informational confirmation of payment; `checkout_completed` is the
    /// authoritative success signal in this domain.
    PaymentSucceeded,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::CheckoutCompleted => write!(f, "checkout_completed"),
            EventKind::PaymentFailed => write!(f, "payment_failed"),
            EventKind::ChargeRefunded => write!(f, "charge_refunded"),
            EventKind::PaymentSucceeded => write!(f, "payment_succeeded"),
        }
    }
}

/// The object an event describes: a checkout session, payment, or charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventObject {
    /// Provider-side payment reference (`payment_ref` on success events is
    /// persisted onto the order; failure/refund events are looked up by it).
    #[serde(default)]
    pub payment_ref: Option<String>,
    /// Total amount in minor currency units, when the provider reports one.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Free-form string metadata attached at checkout creation time.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A full inbound event delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Provider-assigned, globally unique event identifier.
    pub id: String,
    pub kind: EventKind,
    /// Unix timestamp of event creation on the provider side.
    pub created: i64,
    pub data: EventObject,
}

impl EventEnvelope {
    /// Metadata lookup helper; empty strings count as absent.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.data
            .metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_with_metadata() {
        let json = r#"{
            "id": "evt_01",
            "kind": "checkout_completed",
            "created": 1720000000,
            "data": {
                "payment_ref": "pi_123",
                "amount": 500,
                "metadata": { "kind": "wallet_credit", "wallet_id": "f1ab0000-0000-0000-0000-000000000001", "amount": "500" }
            }
        }"#;
        let env: EventEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.kind, EventKind::CheckoutCompleted);
        assert_eq!(env.meta("kind"), Some("wallet_credit"));
        assert_eq!(env.data.amount, Some(500));
    }

    #[test]
    fn envelope_parses_without_optional_fields() {
        let json = r#"{ "id": "evt_02", "kind": "payment_succeeded", "created": 0, "data": {} }"#;
        let env: EventEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.data.payment_ref, None);
        assert!(env.data.metadata.is_empty());
        assert_eq!(env.meta("anything"), None);
    }

    #[test]
    fn empty_metadata_value_counts_as_absent() {
        let json = r#"{ "id": "evt_03", "kind": "checkout_completed", "created": 0,
            "data": { "metadata": { "order_id": "" } } }"#;
        let env: EventEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.meta("order_id"), None);
    }
}
