//! Payment provider and service secrets.

/// Configuration for the upstream payment provider whose webhook deliveries
/// the server ingests.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Human-readable provider name (log texture only).
    pub name: String,
    /// Shared webhook signing secret, configured out-of-band.
    pub secret: Box<[u8]>,
}

impl ProviderConfig {
    /// Create a new ProviderConfig.
    pub fn new(name: String, secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            name,
            secret: secret.into(),
        }
    }

    /// Get the secret key bytes for HMAC verification.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}

/// Configuration for the selling-side backend using the signed Service API.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Secret key bytes for HMAC signing of service bodies.
    pub secret: Box<[u8]>,
}

impl ServiceConfig {
    /// Create a new ServiceConfig.
    pub fn new(secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Get the secret key bytes for HMAC signing.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}
