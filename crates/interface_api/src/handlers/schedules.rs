//! Fee schedule handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ClassId, FeeCategoryId, FeeScheduleId, Money};

use crate::auth::{permissions, Claims};
use crate::dto::schedules::*;
use crate::{error::ApiError, AppState};

pub async fn create_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateFeeScheduleRequest>,
) -> Result<(StatusCode, Json<FeeScheduleResponse>), ApiError> {
    claims.require(permissions::FEES_ADMIN)?;
    request.validate()?;

    let schedule = state
        .admin
        .create_schedule(
            claims.school(),
            ClassId::from_uuid(request.class_id),
            Money::new(request.total),
            &request.academic_period,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(schedule.into())))
}

pub async fn add_schedule_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<AddScheduleItemRequest>,
) -> Result<(StatusCode, Json<ScheduleItemResponse>), ApiError> {
    claims.require(permissions::FEES_ADMIN)?;

    let item = state
        .admin
        .add_schedule_item(
            claims.school(),
            FeeScheduleId::from_uuid(schedule_id),
            FeeCategoryId::from_uuid(request.vote_head_id),
            Money::new(request.amount),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

pub async fn list_schedule_items(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Vec<ScheduleItemResponse>>, ApiError> {
    claims.require(permissions::FEES_READ)?;
    let items = state
        .admin
        .list_schedule_items(claims.school(), FeeScheduleId::from_uuid(schedule_id))
        .await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}
