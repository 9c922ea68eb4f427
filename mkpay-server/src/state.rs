//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use mkpay_core::dispatch::Dispatcher;
use mkpay_core::events::AlertSender;
use mkpay_core::ingest::IngestionGateway;
use mkpay_core::ledger::Ledger;
use mkpay_core::store::SharedStore;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
/// The pool itself stays in `main`; handlers only see the store seam.
#[derive(Clone)]
pub struct AppState {
    /// Storage seam; all handlers go through this.
    pub store: SharedStore,
    /// Runtime configuration (can be reloaded via SIGHUP).
    pub config: SharedConfig,
    /// Channel to the OpsMonitor.
    pub alerts: AlertSender,
}

impl AppState {
    pub fn new(store: SharedStore, config: SharedConfig, alerts: AlertSender) -> Self {
        Self {
            store,
            config,
            alerts,
        }
    }

    /// Build a ledger handle over the configured currency.
    pub async fn ledger(&self) -> Ledger {
        let ingest = self.config.ingest.read().await;
        Ledger::new(self.store.clone(), ingest.currency.clone())
    }

    /// Assemble an ingestion gateway from the current configuration.
    ///
    /// Gateways are thin handles over the shared store; building one per
    /// request keeps SIGHUP-reloaded secrets and tunables effective without
    /// restart.
    pub async fn gateway(&self) -> IngestionGateway {
        let ingest = self.config.ingest.read().await;
        let provider = self.config.provider.read().await;
        let ledger = Ledger::new(self.store.clone(), ingest.currency.clone());
        let dispatcher = Dispatcher::new(self.store.clone(), ledger);
        IngestionGateway::new(
            self.store.clone(),
            dispatcher,
            provider.secret.clone(),
            self.alerts.clone(),
            ingest.policy.clone(),
        )
    }
}
