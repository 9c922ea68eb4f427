//! Event classification and side-effect dispatch.
//!
//! The free-form metadata map on an inbound event is decoded exactly once,
//! at the ingestion boundary, into the closed [`intent::EventIntent`] union;
//! handlers downstream never re-check optional fields.

pub mod dispatcher;
pub mod intent;

pub use dispatcher::{DispatchError, DispatchSummary, Dispatcher, EffectOutcome, SideEffect};
pub use intent::{CheckoutPurpose, EventIntent, IntentError};
