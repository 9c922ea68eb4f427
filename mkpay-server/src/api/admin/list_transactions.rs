use axum::{
    Json,
    extract::{Path, Query},
    response::IntoResponse,
};
use mkpay_sdk::objects::admin::{AdminTransactionResponse, PageQuery, clamp_pagination};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /wallets/{wallet_id}/transactions` — list a wallet's ledger rows,
/// newest first.
pub async fn list_transactions(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(wallet_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);

    // 404 for unknown wallets rather than an empty list
    state
        .store
        .get_wallet(wallet_id)
        .await?
        .ok_or(AdminApiError::NotFound)?;

    let transactions = state
        .store
        .wallet_transactions(wallet_id, limit, offset)
        .await?;

    let response: Vec<AdminTransactionResponse> = transactions
        .into_iter()
        .map(|t| AdminTransactionResponse {
            transaction_id: t.transaction_id,
            wallet_id: t.wallet_id,
            amount: t.amount,
            ref_type: t.ref_type.to_string(),
            ref_id: t.ref_id,
            purpose: t.purpose,
            idempotency_key: t.idempotency_key,
            balance_after: t.balance_after,
            created_at: t.created_at.unix_timestamp(),
        })
        .collect();

    Ok(Json(response))
}
