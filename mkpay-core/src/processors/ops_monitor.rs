//! OpsMonitor processor.
//!
//! Drains the OpsAlert channel and emits one tagged `error!` line per
//! alert. The `alert` field is stable and intended for log-based routing
//! (pager rules match on it); everything else is context.

use tokio::sync::watch;
use tracing::{error, info};

use crate::events::{AlertReceiver, OpsAlert};

/// Drains operational alerts until shutdown.
pub struct OpsMonitor {
    alert_rx: AlertReceiver,
    shutdown_rx: watch::Receiver<bool>,
}

impl OpsMonitor {
    pub fn new(alert_rx: AlertReceiver, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            alert_rx,
            shutdown_rx,
        }
    }

    /// Run the OpsMonitor.
    pub async fn run(mut self) {
        info!("OpsMonitor started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("OpsMonitor received shutdown signal");
                        break;
                    }
                }

                alert = self.alert_rx.recv() => {
                    match alert {
                        Some(alert) => Self::emit(&alert),
                        None => {
                            info!("OpsAlert channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Drain whatever is still buffered so shutdown never loses alerts.
        while let Ok(alert) = self.alert_rx.try_recv() {
            Self::emit(&alert);
        }

        info!("OpsMonitor shutdown complete");
    }

    fn emit(alert: &OpsAlert) {
        match alert {
            OpsAlert::EventParked {
                external_id,
                reason,
            } => {
                error!(
                    alert = "event_parked",
                    external_id,
                    reason,
                    "event moved to dead-letter queue"
                );
            }
            OpsAlert::InsufficientFunds {
                external_id,
                wallet_id,
                balance,
                requested,
            } => {
                error!(
                    alert = "insufficient_funds",
                    external_id,
                    wallet_id = %wallet_id,
                    balance,
                    requested,
                    "wallet debit refused; event parked"
                );
            }
        }
    }
}
