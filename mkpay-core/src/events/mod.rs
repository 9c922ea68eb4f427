//! Operational alert events.
//!
//! Conditions that need a human (or at least a pager) are emitted as
//! [`OpsAlert`] values onto an in-process channel and drained by the
//! [`crate::processors::OpsMonitor`]. Alerts are ephemeral and carry
//! identifiers rather than full rows; the monitor re-fetches from the
//! store if it needs more context.

pub mod channels;
pub mod types;

pub use channels::{ops_alert_channel, AlertReceiver, AlertSender, DEFAULT_CHANNEL_BUFFER};
pub use types::OpsAlert;
