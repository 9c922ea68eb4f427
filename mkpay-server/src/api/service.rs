//! Service API handlers.
//!
//! These endpoints are called by the selling-side backend and require
//! a signed body verified via the `Mkpay-Signature` header.
//!
//! # Endpoints
//!
//! - `POST /orders`        – register a new pending order
//! - `POST /orders/status` – get the status of an existing order

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use mkpay_core::entities::order::{NewOrder, Order};
use mkpay_sdk::objects::{CreateOrderRequest, GetOrderRequest, OrderResponse};

use crate::api::extractors::SignedBody;
use crate::state::AppState;

/// Build the Service API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/status", post(get_order_status))
}

/// Convert an `Order` (DB model) into an `OrderResponse` (API model).
fn to_response(order: &Order) -> OrderResponse {
    OrderResponse {
        order_id: order.order_id,
        status: order.status.into(),
        amount: order.amount,
        provider_payment_ref: order.provider_payment_ref.clone(),
        updated_at: order.updated_at.unix_timestamp(),
    }
}

/// `POST /orders` — register a new pending order.
///
/// The selling side mints the order id before payment; a payment event
/// naming it later drives the state machine.
async fn create_order(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceApiError> {
    if payload.amount < 0 {
        return Err(ServiceApiError::NegativeAmount);
    }
    let order = state
        .store
        .create_order(NewOrder {
            order_id: payload.order_id,
            amount: payload.amount,
        })
        .await
        .map_err(ServiceApiError::Storage)?;

    Ok((StatusCode::CREATED, Json(to_response(&order))))
}

/// `POST /orders/status` — get the status of an existing order.
///
/// Accepts a signed `GetOrderRequest` body containing the order UUID.
async fn get_order_status(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<GetOrderRequest>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let order = state
        .store
        .get_order(payload.order_id)
        .await
        .map_err(ServiceApiError::Storage)?
        .ok_or(ServiceApiError::NotFound)?;

    Ok(Json(to_response(&order)))
}

/// Errors that can occur in Service API handlers.
#[derive(Debug)]
enum ServiceApiError {
    /// A storage operation failed.
    Storage(mkpay_core::store::StoreError),
    /// The requested order was not found.
    NotFound,
    /// Orders cannot be registered with a negative amount.
    NegativeAmount,
}

impl IntoResponse for ServiceApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ServiceApiError::Storage(e) => {
                tracing::error!(error = %e, "Service API storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            ServiceApiError::NotFound => (StatusCode::NOT_FOUND, "order not found").into_response(),
            ServiceApiError::NegativeAmount => {
                (StatusCode::BAD_REQUEST, "amount must not be negative").into_response()
            }
        }
    }
}
