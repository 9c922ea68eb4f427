use axum::{Json, extract::Query, response::IntoResponse};
use mkpay_sdk::objects::admin::{AdminDeadLetterResponse, PageQuery, clamp_pagination};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /dead-letters` — list parked events, newest first.
pub async fn list_dead_letters(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);

    let dead_letters = state.store.list_dead_letters(limit, offset).await?;

    let response: Vec<AdminDeadLetterResponse> = dead_letters
        .into_iter()
        .map(|d| AdminDeadLetterResponse {
            external_id: d.external_id,
            kind: mkpay_sdk::objects::EventKind::from(d.kind).to_string(),
            reason: d.reason,
            parked_at: d.parked_at.unix_timestamp(),
            payload: d.payload,
        })
        .collect();

    Ok(Json(response))
}
