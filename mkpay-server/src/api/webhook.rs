//! Provider webhook endpoint.
//!
//! The signature covers the raw bytes exactly as delivered, so the handler
//! takes `Bytes` rather than `Json<T>`; parsing happens inside the gateway
//! after verification.
//!
//! # Response contract
//!
//! The provider redelivers on anything but 2xx, so status codes steer its
//! retry behavior:
//! - processed, duplicate, in-flight, parked: `200` (redelivery would not help)
//! - bad signature, malformed body or metadata: `400`
//! - storage unavailable: `503` (please retry the whole delivery)

use axum::{
    Json, Router,
    body::Bytes,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use mkpay_core::ingest::{IngestError, IngestOutcome};
use mkpay_sdk::signature::SIGNATURE_HEADER;
use serde::Serialize;

use crate::state::AppState;

/// Build the webhook router.
pub fn router() -> Router<AppState> {
    Router::new().route("/payments", post(receive_payment_event))
}

#[derive(Serialize)]
struct WebhookResponse {
    received: bool,
    status: &'static str,
}

impl WebhookResponse {
    fn new(status: &'static str) -> Self {
        Self {
            received: true,
            status,
        }
    }
}

/// `POST /payments` — ingest one provider event delivery.
async fn receive_payment_event(
    state: axum::extract::State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookError> {
    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .ok_or(WebhookError::MissingSignature)?
        .to_str()
        .map_err(|_| WebhookError::MissingSignature)?;

    let gateway = state.gateway().await;
    let outcome = gateway.accept(&body, signature_header).await?;

    let status = match outcome {
        IngestOutcome::Processed(_) => "processed",
        IngestOutcome::Duplicate => "duplicate",
        IngestOutcome::InFlight => "in_flight",
        IngestOutcome::Parked { .. } => "parked",
        IngestOutcome::AlreadyParked => "parked",
    };
    Ok(Json(WebhookResponse::new(status)))
}

/// Errors surfaced to the provider.
#[derive(Debug)]
enum WebhookError {
    MissingSignature,
    Ingest(IngestError),
}

impl From<IngestError> for WebhookError {
    fn from(err: IngestError) -> Self {
        Self::Ingest(err)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> axum::response::Response {
        match self {
            WebhookError::MissingSignature => {
                (StatusCode::BAD_REQUEST, "missing Mkpay-Signature header").into_response()
            }
            WebhookError::Ingest(IngestError::Authentication(e)) => {
                tracing::warn!(error = %e, "webhook signature verification failed");
                (StatusCode::BAD_REQUEST, "signature verification failed").into_response()
            }
            WebhookError::Ingest(IngestError::Malformed(e)) => {
                tracing::warn!(error = %e, "webhook body is not a valid event envelope");
                (StatusCode::BAD_REQUEST, "invalid event envelope").into_response()
            }
            WebhookError::Ingest(IngestError::Metadata(e)) => {
                tracing::warn!(error = %e, "webhook metadata rejected");
                (StatusCode::BAD_REQUEST, "invalid event metadata").into_response()
            }
            WebhookError::Ingest(IngestError::Storage(e)) => {
                tracing::error!(error = %e, "storage unavailable during webhook ingestion");
                (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable").into_response()
            }
        }
    }
}
