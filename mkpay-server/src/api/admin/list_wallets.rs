use axum::{Json, extract::Query, response::IntoResponse};
use mkpay_sdk::objects::admin::{AdminWalletResponse, PageQuery, clamp_pagination};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /wallets` — list wallets with their cached balances.
pub async fn list_wallets(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);

    let wallets = state.store.list_wallets(limit, offset).await?;

    let response: Vec<AdminWalletResponse> = wallets
        .into_iter()
        .map(|w| AdminWalletResponse {
            wallet_id: w.wallet_id,
            owner_type: w.owner_type.into(),
            owner_id: w.owner_id,
            currency: w.currency,
            balance: w.balance,
        })
        .collect();

    Ok(Json(response))
}
