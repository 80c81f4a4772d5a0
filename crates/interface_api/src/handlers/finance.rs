//! Payment and balance handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Money, PaymentId, StudentId};
use domain_fees::NewPayment;

use crate::auth::{permissions, Claims};
use crate::dto::finance::*;
use crate::{error::ApiError, AppState};

/// Records a cash or bank payment and allocates it across vote heads
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<ReceiptResponse>), ApiError> {
    claims.require(permissions::FEES_WRITE)?;
    request.validate()?;

    let receipt = state
        .payments
        .record_payment(NewPayment {
            student_id: StudentId::from_uuid(request.student_id),
            school_id: claims.school(),
            amount: Money::new(request.amount),
            method: request.payment_method,
            reference: request.reference,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    claims.require(permissions::FEES_READ)?;
    let payments = state
        .payments
        .list_payments(claims.school(), query.student_id.map(StudentId::from_uuid))
        .await?;
    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

/// A payment with the allocations it produced
pub async fn get_receipt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    claims.require(permissions::FEES_READ)?;
    let receipt = state
        .payments
        .receipt(claims.school(), PaymentId::from_uuid(id))
        .await?;
    Ok(Json(receipt.into()))
}

pub async fn student_balances(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<BalanceBreakdownResponse>, ApiError> {
    claims.require(permissions::FEES_READ)?;
    let breakdown = state
        .balances
        .breakdown(StudentId::from_uuid(student_id), claims.school())
        .await?;
    Ok(Json(breakdown.into()))
}

/// Discards the student's balances and rebuilds them from the fee schedule
pub async fn reinitialize_balances(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<BalanceBreakdownResponse>, ApiError> {
    claims.require(permissions::FEES_WRITE)?;
    let breakdown = state
        .balances
        .reinitialize(StudentId::from_uuid(student_id), claims.school())
        .await?;
    Ok(Json(breakdown.into()))
}
