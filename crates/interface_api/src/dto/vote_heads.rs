//! Vote head DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_fees::FeeCategory;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVoteHeadRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Omitted: placed after the school's current last vote head
    #[validate(range(min = 1))]
    pub priority: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateVoteHeadRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(range(min = 1))]
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VoteHeadPriority {
    pub id: Uuid,
    #[validate(range(min = 1))]
    pub priority: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderVoteHeadsRequest {
    #[validate(length(min = 1), nested)]
    pub vote_heads: Vec<VoteHeadPriority>,
}

#[derive(Debug, Serialize)]
pub struct VoteHeadResponse {
    pub id: Uuid,
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FeeCategory> for VoteHeadResponse {
    fn from(category: FeeCategory) -> Self {
        Self {
            id: category.id.into(),
            name: category.name,
            priority: category.priority,
            is_active: category.is_active,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}
