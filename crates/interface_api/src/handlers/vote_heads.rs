//! Vote head handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::FeeCategoryId;
use domain_fees::CategoryUpdate;

use crate::auth::{permissions, Claims};
use crate::dto::vote_heads::*;
use crate::{error::ApiError, AppState};

/// Lists the school's vote heads in allocation order
pub async fn list_vote_heads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<VoteHeadResponse>>, ApiError> {
    claims.require(permissions::FEES_READ)?;
    let categories = state.admin.list_categories(claims.school()).await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

pub async fn create_vote_head(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateVoteHeadRequest>,
) -> Result<(StatusCode, Json<VoteHeadResponse>), ApiError> {
    claims.require(permissions::FEES_ADMIN)?;
    request.validate()?;

    let category = state
        .admin
        .create_category(claims.school(), &request.name, request.priority)
        .await?;
    Ok((StatusCode::CREATED, Json(category.into())))
}

pub async fn update_vote_head(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateVoteHeadRequest>,
) -> Result<Json<VoteHeadResponse>, ApiError> {
    claims.require(permissions::FEES_ADMIN)?;
    request.validate()?;

    let update = CategoryUpdate {
        name: request.name,
        priority: request.priority,
        is_active: request.is_active,
    };
    let category = state
        .admin
        .update_category(claims.school(), FeeCategoryId::from_uuid(id), update)
        .await?;
    Ok(Json(category.into()))
}

/// Soft delete; history and balances stay
pub async fn deactivate_vote_head(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<VoteHeadResponse>, ApiError> {
    claims.require(permissions::FEES_ADMIN)?;
    let category = state
        .admin
        .deactivate_category(claims.school(), FeeCategoryId::from_uuid(id))
        .await?;
    Ok(Json(category.into()))
}

pub async fn reorder_vote_heads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<ReorderVoteHeadsRequest>,
) -> Result<Json<Vec<VoteHeadResponse>>, ApiError> {
    claims.require(permissions::FEES_ADMIN)?;
    request.validate()?;

    let order: Vec<_> = request
        .vote_heads
        .iter()
        .map(|v| (FeeCategoryId::from_uuid(v.id), v.priority))
        .collect();
    let categories = state.admin.reorder_categories(claims.school(), &order).await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}
