//! HTTP API surface.
//!
//! Three authentication schemes, one per caller:
//! - `/webhook` — the payment provider; raw-body HMAC via `Mkpay-Signature`.
//! - `/service` — the selling-side backend; signed JSON bodies.
//! - `/admin`   — the admin dashboard; plaintext secret header checked
//!   against the stored argon2 hash.

pub mod admin;
pub mod extractors;
pub mod service;
pub mod webhook;
