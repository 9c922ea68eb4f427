//! Ingestion gateway: the single entry point for provider webhook bodies.
//!
//! One `accept` call carries an event end to end: signature verification
//! over the raw bytes, envelope parsing, intent decoding, the dedup claim,
//! the bounded-retry dispatch loop, and the final commit, release, or park.
//! Nothing before the claim mutates state, so rejected deliveries leave no
//! trace.

use std::sync::Arc;
use std::time::Duration;

use fast32::base64::RFC4648_NOPAD;
use ring::digest;
use tracing::{info, warn};

use mkpay_sdk::signature::{self, SignatureError};
use mkpay_sdk::objects::EventEnvelope;

use crate::dispatch::{DispatchError, DispatchSummary, Dispatcher, EventIntent, IntentError};
use crate::entities::processed_event::ClaimOutcome;
use crate::events::{AlertSender, OpsAlert};
use crate::ledger::LedgerError;
use crate::store::{Store, StoreError};

/// Tunables for the dispatch loop and claim lifecycle.
#[derive(Debug, Clone)]
pub struct IngestPolicy {
    /// Dispatch attempts per delivery before the event is parked.
    pub max_attempts: u32,
    /// Wall-clock cap on one dispatch pass; a hung pass counts as a
    /// retryable failure.
    pub effect_timeout: Duration,
    /// Age after which another delivery may take over a `pending` claim
    /// (crashed-worker recovery).
    pub claim_stale_after: Duration,
    /// Base delay for exponential backoff between attempts.
    pub retry_base_delay: Duration,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            effect_timeout: Duration::from_secs(10),
            claim_stale_after: Duration::from_secs(60),
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

/// Terminal disposition of one accepted delivery.
#[derive(Debug)]
pub enum IngestOutcome {
    /// All side effects settled; the event is durably marked processed.
    Processed(DispatchSummary),
    /// A previous delivery already processed this event. Reported as
    /// success to the provider so it stops redelivering.
    Duplicate,
    /// Another worker holds a fresh claim on this event.
    InFlight,
    /// This delivery exhausted its options and parked the event.
    Parked { reason: String },
    /// The event was already dead-lettered before this delivery; redelivery
    /// does not retry it, only manual replay does.
    AlreadyParked,
}

/// Failures that reject a delivery outright.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("signature verification failed: {0}")]
    Authentication(#[from] SignatureError),
    #[error("request body is not a valid event envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event metadata could not be decoded: {0}")]
    Metadata(#[from] IntentError),
    /// The claim could not be taken or settled; the provider should retry
    /// the whole delivery later.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Exponential backoff for attempt `n` (1-based), capped at 30s.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    base.saturating_mul(factor).min(Duration::from_secs(30))
}

pub struct IngestionGateway {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
    provider_secret: Box<[u8]>,
    alerts: AlertSender,
    policy: IngestPolicy,
}

impl IngestionGateway {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Dispatcher,
        provider_secret: impl Into<Box<[u8]>>,
        alerts: AlertSender,
        policy: IngestPolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            provider_secret: provider_secret.into(),
            alerts,
            policy,
        }
    }

    /// Ingest one raw webhook delivery.
    ///
    /// The signature covers the exact bytes received, so verification runs
    /// before any parsing.
    pub async fn accept(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<IngestOutcome, IngestError> {
        signature::verify_body(signature_header, raw_body, &self.provider_secret)?;

        let envelope: EventEnvelope = serde_json::from_slice(raw_body)?;
        let intent = EventIntent::decode(&envelope)?;
        let payload: serde_json::Value = serde_json::from_slice(raw_body)?;
        let payload_hash = hash_payload(raw_body);

        match self
            .store
            .claim_event(
                &envelope.id,
                envelope.kind.into(),
                &payload_hash,
                &payload,
                self.policy.claim_stale_after,
            )
            .await?
        {
            ClaimOutcome::Claimed => self.settle(&envelope.id, &intent).await,
            ClaimOutcome::AlreadyProcessed => {
                info!(external_id = %envelope.id, "duplicate delivery of processed event");
                Ok(IngestOutcome::Duplicate)
            }
            ClaimOutcome::InFlight => {
                info!(external_id = %envelope.id, "event already claimed by another worker");
                Ok(IngestOutcome::InFlight)
            }
            ClaimOutcome::Parked => {
                warn!(
                    external_id = %envelope.id,
                    "redelivery of dead-lettered event; awaiting manual replay"
                );
                Ok(IngestOutcome::AlreadyParked)
            }
        }
    }

    /// Replay a dead-lettered event from its stored payload.
    ///
    /// Returns `None` when no dead letter exists under `external_id`.
    pub async fn retry_parked(
        &self,
        external_id: &str,
    ) -> Result<Option<IngestOutcome>, IngestError> {
        let Some(dead_letter) = self.store.reopen_dead_letter(external_id).await? else {
            return Ok(None);
        };
        let envelope: EventEnvelope = match serde_json::from_value(dead_letter.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                let reason = format!("stored payload no longer parses: {err}");
                self.park(external_id, &reason, None).await?;
                return Ok(Some(IngestOutcome::Parked { reason }));
            }
        };
        let intent = match EventIntent::decode(&envelope) {
            Ok(intent) => intent,
            Err(err) => {
                let reason = format!("stored metadata no longer decodes: {err}");
                self.park(external_id, &reason, None).await?;
                return Ok(Some(IngestOutcome::Parked { reason }));
            }
        };
        Ok(Some(self.settle(external_id, &intent).await?))
    }

    /// Run the dispatch loop for a claimed event and settle the claim:
    /// commit on success, park on a fatal error or an exhausted retry
    /// budget, release on storage failure so redelivery starts clean.
    async fn settle(
        &self,
        external_id: &str,
        intent: &EventIntent,
    ) -> Result<IngestOutcome, IngestError> {
        let mut attempt = 1u32;
        loop {
            let pass =
                tokio::time::timeout(self.policy.effect_timeout, async {
                    self.dispatcher.dispatch(external_id, intent).await
                })
                .await;

            match pass {
                Ok(Ok(summary)) => {
                    if let Err(err) = self.store.mark_event_processed(external_id).await {
                        // Effects are individually idempotent, so releasing
                        // and letting the provider redeliver is safe.
                        warn!(external_id, error = %err, "commit failed; releasing claim");
                        self.store.release_event(external_id).await?;
                        return Err(err.into());
                    }
                    info!(external_id, effects = %summary.describe(), "event processed");
                    return Ok(IngestOutcome::Processed(summary));
                }
                Ok(Err(err)) if !err.is_retryable() => {
                    let reason = err.to_string();
                    self.park(external_id, &reason, Some(&err)).await?;
                    return Ok(IngestOutcome::Parked { reason });
                }
                Ok(Err(err)) => {
                    if attempt >= self.policy.max_attempts {
                        let reason =
                            format!("retry budget exhausted after {attempt} attempts: {err}");
                        self.park(external_id, &reason, None).await?;
                        return Ok(IngestOutcome::Parked { reason });
                    }
                    warn!(external_id, attempt, error = %err, "dispatch failed; retrying");
                }
                Err(_elapsed) => {
                    if attempt >= self.policy.max_attempts {
                        let reason = format!("dispatch timed out on attempt {attempt}");
                        self.park(external_id, &reason, None).await?;
                        return Ok(IngestOutcome::Parked { reason });
                    }
                    warn!(external_id, attempt, "dispatch pass timed out; retrying");
                }
            }

            tokio::time::sleep(retry_delay(self.policy.retry_base_delay, attempt)).await;
            attempt += 1;
        }
    }

    async fn park(
        &self,
        external_id: &str,
        reason: &str,
        error: Option<&DispatchError>,
    ) -> Result<(), StoreError> {
        self.store.park_event(external_id, reason).await?;
        let alert = match error {
            Some(DispatchError::Ledger(LedgerError::InsufficientFunds {
                wallet_id,
                balance,
                requested,
            })) => OpsAlert::InsufficientFunds {
                external_id: external_id.to_owned(),
                wallet_id: *wallet_id,
                balance: *balance,
                requested: *requested,
            },
            _ => OpsAlert::EventParked {
                external_id: external_id.to_owned(),
                reason: reason.to_owned(),
            },
        };
        if self.alerts.send(alert).await.is_err() {
            warn!(external_id, "alert channel closed; alert dropped");
        }
        Ok(())
    }
}

/// SHA-256 of the raw body, base64 without padding. Stored with the dedup
/// marker so an audit can tie a marker back to the exact bytes received.
pub fn hash_payload(raw_body: &[u8]) -> String {
    let digest = digest::digest(&digest::SHA256, raw_body);
    RFC4648_NOPAD.encode(digest.as_ref())
}
