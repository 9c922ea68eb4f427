//! Runtime configuration types.
//!
//! Secret-carrying sections (`AdminConfig`, `ProviderConfig`,
//! `ServiceConfig`) are defined in `mkpay-sdk::config` so integrators can
//! reuse them; the server-only sections live here. Each section sits behind
//! its own lock so a SIGHUP reload swaps them independently.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mkpay_core::ingest::IngestPolicy;
use tokio::sync::RwLock;

pub use mkpay_sdk::config::{AdminConfig, ProviderConfig, ServiceConfig};

/// Server listen configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Ingestion tunables in their runtime shape.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub currency: String,
    pub policy: IngestPolicy,
}

impl From<crate::config::file::IngestConfig> for IngestConfig {
    fn from(file: crate::config::file::IngestConfig) -> Self {
        Self {
            currency: file.currency,
            policy: IngestPolicy {
                max_attempts: file.max_attempts,
                effect_timeout: Duration::from_secs(file.effect_timeout_secs),
                claim_stale_after: Duration::from_secs(file.claim_stale_secs),
                retry_base_delay: Duration::from_millis(file.retry_base_delay_ms),
            },
        }
    }
}

/// All runtime configuration sections behind individual locks.
#[derive(Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub admin: Arc<RwLock<AdminConfig>>,
    pub provider: Arc<RwLock<ProviderConfig>>,
    pub service: Arc<RwLock<ServiceConfig>>,
    pub ingest: Arc<RwLock<IngestConfig>>,
}
