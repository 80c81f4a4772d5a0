//! Fee schedule DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_fees::{FeeSchedule, FeeScheduleItem};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeeScheduleRequest {
    pub class_id: Uuid,
    pub total: Decimal,
    #[validate(length(min = 1, max = 64))]
    pub academic_period: String,
}

#[derive(Debug, Deserialize)]
pub struct AddScheduleItemRequest {
    pub vote_head_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct FeeScheduleResponse {
    pub id: Uuid,
    pub class_id: Uuid,
    pub total: Decimal,
    pub academic_period: String,
    pub created_at: DateTime<Utc>,
}

impl From<FeeSchedule> for FeeScheduleResponse {
    fn from(schedule: FeeSchedule) -> Self {
        Self {
            id: schedule.id.into(),
            class_id: schedule.class_id.into(),
            total: schedule.total.amount(),
            academic_period: schedule.academic_period,
            created_at: schedule.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleItemResponse {
    pub id: Uuid,
    pub fee_schedule_id: Uuid,
    pub vote_head_id: Uuid,
    pub amount: Decimal,
}

impl From<FeeScheduleItem> for ScheduleItemResponse {
    fn from(item: FeeScheduleItem) -> Self {
        Self {
            id: item.id.into(),
            fee_schedule_id: item.schedule_id.into(),
            vote_head_id: item.category_id.into(),
            amount: item.amount.amount(),
        }
    }
}
