//! Background processors.
//!
//! - `OpsMonitor`: drains [`crate::events::OpsAlert`] and writes tagged,
//!   machine-greppable error lines for the alerting pipeline.

pub mod ops_monitor;

pub use ops_monitor::OpsMonitor;
