//! TOML file configuration structures.
//!
//! These structs directly map to the `mkpay-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub provider: ProviderConfig,
    pub service: ServiceConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default address")
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Upstream payment provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Human-readable provider name.
    pub name: String,
    /// Shared webhook signing secret.
    pub secret: String,
}

/// Selling-side backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Secret key for signing Service API requests.
    pub secret: String,
}

/// Ingestion tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Ledger currency code for all wallets.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Dispatch attempts per delivery before parking.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-pass dispatch timeout in seconds.
    #[serde(default = "default_effect_timeout_secs")]
    pub effect_timeout_secs: u64,
    /// Age in seconds after which a pending claim may be taken over.
    #[serde(default = "default_claim_stale_secs")]
    pub claim_stale_secs: u64,
    /// Base backoff delay between dispatch attempts, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_currency() -> String {
    "AED".to_owned()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_effect_timeout_secs() -> u64 {
    10
}

fn default_claim_stale_secs() -> u64 {
    60
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            max_attempts: default_max_attempts(),
            effect_timeout_secs: default_effect_timeout_secs(),
            claim_stale_secs: default_claim_stale_secs(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "test-secret"

[provider]
name = "Stripe"
secret = "whsec_abc123"

[service]
secret = "svc_secret456"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.provider.name, "Stripe");
        assert_eq!(config.ingest.max_attempts, 3);
        assert_eq!(config.ingest.currency, "AED");
        assert!(!config.is_admin_secret_hashed());
    }

    #[test]
    fn test_ingest_overrides() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "$argon2id$v=19$m=19456,t=2,p=1$abc123"

[provider]
name = "Stripe"
secret = "whsec_abc123"

[service]
secret = "svc_secret456"

[ingest]
currency = "USD"
max_attempts = 5
retry_base_delay_ms = 250
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.ingest.currency, "USD");
        assert_eq!(config.ingest.max_attempts, 5);
        assert_eq!(config.ingest.retry_base_delay_ms, 250);
        assert_eq!(config.ingest.effect_timeout_secs, 10);
        assert!(config.is_admin_secret_hashed());
    }
}
