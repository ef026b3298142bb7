use axum::{
    extract::{ Path, Query, State },
    http::{ header, StatusCode },
    response::IntoResponse,
    Json,
};
use serde::{ Deserialize, Serialize };

use crate::chains::evm::wallet::{ normalize_tx_hash, ClientBroadcast };
use crate::enums::SubscriptionDuration;
use crate::error::{ AppError, Result };
use crate::services::{ PaymentHandle, PaymentQuote, ReconcileOutcome };

use super::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub duration: SubscriptionDuration,
    pub chain_id: u64,
}

/// A payment the user's wallet already broadcast.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentRequest {
    pub address: String,
    pub duration: SubscriptionDuration,
    pub chain_id: u64,
    pub tx_hash: String,
}

#[derive(Serialize)]
pub struct WatchResponse {
    pub cancelled: bool,
}

pub async fn get_quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>
) -> Result<Json<PaymentQuote>> {
    let quote = state.payment_service.quote(query.duration, query.chain_id)?;
    Ok(Json(quote))
}

pub async fn get_quote_qr(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>
) -> Result<impl IntoResponse> {
    let png = state.payment_service.quote_qr_png(query.duration, query.chain_id)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

pub async fn submit_payment(
    State(state): State<AppState>,
    Json(request): Json<SubmitPaymentRequest>
) -> Result<(StatusCode, Json<PaymentHandle>)> {
    let wallet = ClientBroadcast::new(&request.address, request.chain_id, &request.tx_hash);

    let handle = state.payment_service.pay(
        &request.address,
        request.duration,
        request.chain_id,
        Some(&wallet)
    ).await?;

    state.watchers.watch(&handle.hash).await;

    Ok((StatusCode::CREATED, Json(handle)))
}

/// One client-side check. RPC trouble reads as still pending.
pub async fn check_payment(
    State(state): State<AppState>,
    Path(hash): Path<String>
) -> Result<Json<ReconcileOutcome>> {
    let hash = normalize_tx_hash(&hash)?;

    match state.reconciliation_service.reconcile(&hash).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(AppError::ReconciliationTransientFailure(reason)) => {
            tracing::warn!(tx_hash = %hash, "Receipt lookup failed: {}", reason);
            Ok(Json(ReconcileOutcome::StillPending))
        }
        Err(e) => Err(e),
    }
}

pub async fn stop_watching(
    State(state): State<AppState>,
    Path(hash): Path<String>
) -> Result<Json<WatchResponse>> {
    let hash = normalize_tx_hash(&hash)?;
    let cancelled = state.watchers.cancel(&hash).await;
    Ok(Json(WatchResponse { cancelled }))
}
