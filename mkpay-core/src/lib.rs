#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod dispatch;
pub mod entities;
pub mod events;
pub mod ingest;
pub mod ledger;
pub mod processors;
pub mod store;
