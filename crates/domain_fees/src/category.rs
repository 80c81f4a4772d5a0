//! Fee categories (vote heads)
//!
//! A vote head is a named bucket of fee obligation owned by a school.
//! Payments clear vote heads in ascending priority; a lower number is paid
//! first. Equal priorities are broken by category id so the order is total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{FeeCategoryId, SchoolId};

/// A fee category (vote head)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeCategory {
    /// Unique identifier
    pub id: FeeCategoryId,
    /// Owning school
    pub school_id: SchoolId,
    /// Display name ("Tuition", "R&MI", "Activity")
    pub name: String,
    /// Allocation priority, lower is paid first
    pub priority: i32,
    /// Inactive vote heads receive no new allocations
    pub is_active: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl FeeCategory {
    /// Creates a new active vote head
    pub fn new(school_id: SchoolId, name: impl Into<String>, priority: i32) -> Self {
        let now = Utc::now();
        Self {
            id: FeeCategoryId::new_v7(),
            school_id,
            name: name.into(),
            priority,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Key used to order vote heads for allocation
    pub fn allocation_key(&self) -> (i32, FeeCategoryId) {
        (self.priority, self.id)
    }

    /// Marks the vote head inactive
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

/// Priority to give a new vote head when the caller leaves it unset
///
/// Returns one past the current maximum, or 1 for a school with no vote heads.
pub fn next_priority(current_max: Option<i32>) -> i32 {
    current_max.map_or(1, |max| max.saturating_add(1))
}
