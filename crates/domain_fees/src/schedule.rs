//! Fee schedules
//!
//! A schedule is the fee total a school charges a class for an academic
//! period, broken into per-vote-head items. Item amounts are not checked
//! against the total; schools amend items without amending totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClassId, FeeCategoryId, FeeScheduleId, FeeScheduleItemId, Money, SchoolId};

/// Fee schedule for a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub id: FeeScheduleId,
    pub school_id: SchoolId,
    pub class_id: ClassId,
    /// Declared total for the period
    pub total: Money,
    /// Academic period tag, e.g. "2024" or "2024-T1"
    pub academic_period: String,
    pub created_at: DateTime<Utc>,
}

impl FeeSchedule {
    pub fn new(
        school_id: SchoolId,
        class_id: ClassId,
        total: Money,
        academic_period: impl Into<String>,
    ) -> Self {
        Self {
            id: FeeScheduleId::new_v7(),
            school_id,
            class_id,
            total,
            academic_period: academic_period.into(),
            created_at: Utc::now(),
        }
    }
}

/// Portion of a schedule assigned to one vote head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeScheduleItem {
    pub id: FeeScheduleItemId,
    #[serde(rename = "fee_structure_id")]
    pub schedule_id: FeeScheduleId,
    #[serde(rename = "vote_head_id")]
    pub category_id: FeeCategoryId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl FeeScheduleItem {
    pub fn new(schedule_id: FeeScheduleId, category_id: FeeCategoryId, amount: Money) -> Self {
        Self {
            id: FeeScheduleItemId::new_v7(),
            schedule_id,
            category_id,
            amount,
            created_at: Utc::now(),
        }
    }
}
