//! Admin API handlers.
//!
//! These endpoints are called by the admin dashboard and require the
//! `Mkpay-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `GET  /dead-letters`                       – list parked events (paginated)
//! - `POST /dead-letters/{external_id}/retry`   – replay a parked event
//! - `GET  /wallets`                            – list wallets with balances
//! - `GET  /wallets/{wallet_id}/transactions`   – list a wallet's ledger
//! - `POST /wallets/{wallet_id}/adjust`         – manual credit or debit

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::state::AppState;

mod adjust_wallet;
mod list_dead_letters;
mod list_transactions;
mod list_wallets;
mod retry_dead_letter;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dead-letters", get(list_dead_letters::list_dead_letters))
        .route(
            "/dead-letters/{external_id}/retry",
            post(retry_dead_letter::retry_dead_letter),
        )
        .route("/wallets", get(list_wallets::list_wallets))
        .route(
            "/wallets/{wallet_id}/transactions",
            get(list_transactions::list_transactions),
        )
        .route(
            "/wallets/{wallet_id}/adjust",
            post(adjust_wallet::adjust_wallet),
        )
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Storage(mkpay_core::store::StoreError),
    NotFound,
    InsufficientFunds,
    InvalidRequest(&'static str),
}

impl From<mkpay_core::store::StoreError> for AdminApiError {
    fn from(err: mkpay_core::store::StoreError) -> Self {
        Self::Storage(err)
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Storage(e) => {
                tracing::error!(error = %e, "Admin API storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
            AdminApiError::InsufficientFunds => {
                (StatusCode::CONFLICT, "insufficient funds").into_response()
            }
            AdminApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
        }
    }
}
