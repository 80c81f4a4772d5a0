//! M-PESA handlers
//!
//! The C2B callbacks are unauthenticated and always answer HTTP 200 with an
//! acknowledgment body; the network reads only `ResultCode`. The review
//! queue and manual matching sit behind authentication like every other
//! `/api/v1` route.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Extension, Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use core_kernel::{ExternalTransactionId, StudentId};
use domain_fees::{Ack, C2bNotification};

use crate::auth::{permissions, Claims};
use crate::dto::finance::PaymentResponse;
use crate::dto::mpesa::*;
use crate::{error::ApiError, AppState};

fn parse_notification(body: &[u8]) -> Result<C2bNotification, Ack> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Malformed C2B callback body");
        Ack::invalid_request()
    })
}

/// Decides whether the network may accept a payment for the account reference
pub async fn c2b_validation(State(state): State<AppState>, body: Bytes) -> Json<Ack> {
    let notification = match parse_notification(&body) {
        Ok(notification) => notification,
        Err(ack) => return Json(ack),
    };
    info!(
        trans_id = %notification.trans_id,
        reference = %notification.bill_ref_number,
        "C2B validation received"
    );
    Json(state.reconciler.validate(&notification).await)
}

/// Records a completed payment and allocates it when the payer is known
pub async fn c2b_confirmation(State(state): State<AppState>, body: Bytes) -> Json<Ack> {
    let notification = match parse_notification(&body) {
        Ok(notification) => notification,
        Err(ack) => return Json(ack),
    };
    info!(
        trans_id = %notification.trans_id,
        amount = %notification.trans_amount,
        "C2B confirmation received"
    );
    Json(state.reconciler.ingest(&notification).await)
}

/// The review queue: the school's transactions plus unassigned ones
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<MpesaTransactionResponse>>, ApiError> {
    claims.require(permissions::MPESA_RECONCILE)?;
    let transactions = state
        .reconciler
        .list_transactions(claims.school(), query.status)
        .await?;
    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

pub async fn manual_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<ManualMatchRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    claims.require(permissions::MPESA_RECONCILE)?;
    let payment = state
        .reconciler
        .manual_match(
            ExternalTransactionId::from_uuid(id),
            claims.school(),
            StudentId::from_uuid(request.student_id),
        )
        .await?;
    Ok(Json(payment.into()))
}
