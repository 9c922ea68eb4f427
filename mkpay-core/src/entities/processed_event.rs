//! Durable markers for externally-assigned event identifiers.
//!
//! A row here is the permanent record that an `external_id` was seen. The
//! lifecycle is an explicit claim-then-commit state machine so a crash
//! mid-processing is distinguishable from "never started" and "fully done":
//!
//! ```text
//! (no row) ──claim──▶ pending ──commit──▶ processed
//!                       │ └──park──▶ dead_letter ──reopen──▶ pending
//!                       └──release──▶ (no row)
//! ```
//!
//! A `pending` row older than the staleness window is treated as a crashed
//! worker's leftover and may be reclaimed by the next delivery.

use super::EventKind;

/// Processing state of a claimed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "event_state")]
pub enum EventState {
    /// Claimed by a worker; side effects may be in flight.
    Pending,
    /// All side effects applied and committed.
    Processed,
    /// Automatic processing gave up; awaiting manual review.
    DeadLetter,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProcessedEvent {
    pub external_id: String,
    pub kind: EventKind,
    pub state: EventState,
    /// SHA-256 of the raw delivery body, base64-encoded. Audit only.
    pub payload_hash: String,
    /// Raw delivery payload; retained only while `pending` or `dead_letter`
    /// (needed for replay), cleared on commit.
    pub payload: Option<serde_json::Value>,
    pub received_at: time::OffsetDateTime,
    /// When the current claim was taken; the staleness check compares
    /// against this, not `received_at`.
    pub claimed_at: time::OffsetDateTime,
    pub processed_at: Option<time::OffsetDateTime>,
    pub parked_at: Option<time::OffsetDateTime>,
    pub park_reason: Option<String>,
}

/// Outcome of an atomic claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller owns the event and must commit, release, or park it.
    Claimed,
    /// A previous delivery fully processed the event.
    AlreadyProcessed,
    /// Another worker holds a fresh claim; this delivery must no-op.
    InFlight,
    /// The event is dead-lettered; only manual replay may touch it.
    Parked,
}

/// A dead-lettered event as surfaced to operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub external_id: String,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub reason: String,
    pub parked_at: time::OffsetDateTime,
}
