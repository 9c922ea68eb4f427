//! Shared configuration objects used by both the server and integrators.

pub mod admin;
pub mod provider;

pub use admin::AdminConfig;
pub use provider::{ProviderConfig, ServiceConfig};
