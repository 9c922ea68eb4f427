use axum::{Json, extract::Path, response::IntoResponse};
use mkpay_core::entities::wallet::RefType;
use mkpay_core::ledger::LedgerError;
use mkpay_sdk::objects::admin::{AdjustWalletRequest, AdminTransactionResponse};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /wallets/{wallet_id}/adjust` — manual credit or debit.
///
/// The caller-chosen `adjustment_id` is the idempotency reference: retrying
/// the same request applies the movement once and returns the same row.
pub async fn adjust_wallet(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(wallet_id): Path<Uuid>,
    Json(payload): Json<AdjustWalletRequest>,
) -> Result<impl IntoResponse, AdminApiError> {
    // i64::MIN has no negation, so it can never express a valid debit
    let Some(debit_amount) = payload.amount.checked_neg() else {
        return Err(AdminApiError::InvalidRequest("amount out of range"));
    };
    if payload.amount == 0 {
        return Err(AdminApiError::InvalidRequest("amount must not be zero"));
    }
    if payload.purpose.is_empty() {
        return Err(AdminApiError::InvalidRequest("purpose must not be empty"));
    }

    let ledger = state.ledger().await;
    let ref_id = payload.adjustment_id.to_string();

    let receipt = if payload.amount > 0 {
        ledger
            .credit(
                wallet_id,
                payload.amount,
                RefType::AdminAdjustment,
                &ref_id,
                &payload.purpose,
                None,
            )
            .await
    } else {
        ledger
            .debit(
                wallet_id,
                debit_amount,
                RefType::AdminAdjustment,
                &ref_id,
                &payload.purpose,
            )
            .await
    };

    let receipt = receipt.map_err(|err| match err {
        LedgerError::InsufficientFunds { .. } => AdminApiError::InsufficientFunds,
        LedgerError::WalletNotFound(_) => AdminApiError::NotFound,
        LedgerError::InvalidAmount(_) => AdminApiError::InvalidRequest("invalid amount"),
        LedgerError::Storage(e) => AdminApiError::Storage(e),
    })?;

    let t = receipt.transaction;
    Ok(Json(AdminTransactionResponse {
        transaction_id: t.transaction_id,
        wallet_id: t.wallet_id,
        amount: t.amount,
        ref_type: t.ref_type.to_string(),
        ref_id: t.ref_id,
        purpose: t.purpose,
        idempotency_key: t.idempotency_key,
        balance_after: t.balance_after,
        created_at: t.created_at.unix_timestamp(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadedConfig;
    use crate::config::runtime::{IngestConfig, ServerConfig};
    use axum::extract::State;
    use mkpay_core::events::ops_alert_channel;
    use mkpay_core::ingest::IngestPolicy;
    use mkpay_core::store::MemoryStore;
    use mkpay_sdk::config::{AdminConfig, ProviderConfig, ServiceConfig};
    use std::sync::Arc;

    fn test_state() -> AppState {
        let config = LoadedConfig {
            server: ServerConfig {
                listen: "127.0.0.1:0".parse().unwrap(),
            },
            admin: AdminConfig::new("$argon2id$unused".to_owned()),
            provider: ProviderConfig::new("test".to_owned(), &b"provider-secret"[..]),
            service: ServiceConfig::new(&b"service-secret"[..]),
            ingest: IngestConfig {
                currency: "AED".to_owned(),
                policy: IngestPolicy::default(),
            },
        }
        .into_shared();
        let (alert_tx, _alert_rx) = ops_alert_channel();
        AppState::new(Arc::new(MemoryStore::new()), config, alert_tx)
    }

    fn request(amount: i64) -> AdjustWalletRequest {
        AdjustWalletRequest {
            amount,
            adjustment_id: Uuid::now_v7(),
            purpose: "manual correction".to_owned(),
        }
    }

    #[tokio::test]
    async fn min_amount_is_rejected_not_negated() {
        let state = test_state();
        let err = adjust_wallet(
            State(state),
            AdminAuth,
            Path(Uuid::now_v7()),
            Json(request(i64::MIN)),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(
            err,
            AdminApiError::InvalidRequest("amount out of range")
        ));
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let state = test_state();
        let err = adjust_wallet(
            State(state),
            AdminAuth,
            Path(Uuid::now_v7()),
            Json(request(0)),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(
            err,
            AdminApiError::InvalidRequest("amount must not be zero")
        ));
    }
}
