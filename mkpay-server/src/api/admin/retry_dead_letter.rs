use axum::{Json, extract::Path, response::IntoResponse};
use mkpay_core::ingest::{IngestError, IngestOutcome};
use mkpay_sdk::objects::admin::AdminRetryResponse;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /dead-letters/{external_id}/retry` — replay a parked event from its
/// stored payload.
pub async fn retry_dead_letter(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(external_id): Path<String>,
) -> Result<impl IntoResponse, AdminApiError> {
    let gateway = state.gateway().await;

    let outcome = gateway
        .retry_parked(&external_id)
        .await
        .map_err(|err| match err {
            IngestError::Storage(e) => AdminApiError::Storage(e),
            // stored payloads were validated on ingestion; anything else
            // here means the stored row itself is unusable
            _ => AdminApiError::InvalidRequest("stored payload is not replayable"),
        })?
        .ok_or(AdminApiError::NotFound)?;

    let outcome = match outcome {
        IngestOutcome::Processed(_) => "processed",
        IngestOutcome::Parked { .. } => "parked",
        // reopen moved the event to pending under our claim; other outcomes
        // cannot occur on the replay path
        _ => "in_flight",
    };

    Ok(Json(AdminRetryResponse {
        external_id,
        outcome: outcome.to_owned(),
    }))
}
