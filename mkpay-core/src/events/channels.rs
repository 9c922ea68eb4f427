//! Alert channel factory and handles.

use super::types::OpsAlert;
use tokio::sync::mpsc;

/// Default buffer size for the alert channel.
///
/// Enough to absorb a burst of parked events without backpressuring the
/// ingestion path.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for OpsAlert events.
pub type AlertSender = mpsc::Sender<OpsAlert>;
/// Receiver handle for OpsAlert events.
pub type AlertReceiver = mpsc::Receiver<OpsAlert>;

/// Create a new OpsAlert channel.
///
/// Returns a (sender, receiver) pair; multiple senders can be cloned from
/// the returned sender.
pub fn ops_alert_channel() -> (AlertSender, AlertReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
