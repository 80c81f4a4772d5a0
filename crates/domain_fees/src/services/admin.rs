//! Vote head and fee schedule administration

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use core_kernel::{ClassId, FeeCategoryId, FeeScheduleId, Money, SchoolId};

use crate::category::{next_priority, FeeCategory};
use crate::error::FeeError;
use crate::ports::{FeeStorePort, FeeUnitOfWork};
use crate::schedule::{FeeSchedule, FeeScheduleItem};

/// Partial update of a vote head
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
}

/// Manages a school's vote heads and fee schedules
pub struct FeeAdministration {
    store: Arc<dyn FeeStorePort>,
}

impl FeeAdministration {
    pub fn new(store: Arc<dyn FeeStorePort>) -> Self {
        Self { store }
    }

    /// Creates an active vote head
    ///
    /// Without a priority the vote head goes last: one past the school's
    /// current maximum, or 1 for the first vote head.
    #[instrument(skip(self, name), fields(school_id = %school_id))]
    pub async fn create_category(
        &self,
        school_id: SchoolId,
        name: &str,
        priority: Option<i32>,
    ) -> Result<FeeCategory, FeeError> {
        let name = validate_name(name)?;
        if let Some(priority) = priority {
            validate_priority(priority)?;
        }

        let mut uow = self.store.begin().await?;
        let priority = match priority {
            Some(priority) => priority,
            None => next_priority(uow.max_priority(school_id).await?),
        };
        let category = FeeCategory::new(school_id, name, priority);
        uow.insert_category(&category).await?;
        uow.commit().await?;

        info!(category_id = %category.id, priority, "Vote head created");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        school_id: SchoolId,
        category_id: FeeCategoryId,
        update: CategoryUpdate,
    ) -> Result<FeeCategory, FeeError> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        if let Some(priority) = update.priority {
            validate_priority(priority)?;
        }

        let mut uow = self.store.begin().await?;
        let mut category = load_category(uow.as_mut(), school_id, category_id).await?;
        if let Some(name) = name {
            category.name = name.to_string();
        }
        if let Some(priority) = update.priority {
            category.priority = priority;
        }
        if let Some(is_active) = update.is_active {
            category.is_active = is_active;
        }
        category.updated_at = Utc::now();

        uow.update_category(&category).await?;
        uow.commit().await?;
        Ok(category)
    }

    /// Soft delete: the vote head stops receiving allocations, its balances
    /// and history stay
    pub async fn deactivate_category(
        &self,
        school_id: SchoolId,
        category_id: FeeCategoryId,
    ) -> Result<FeeCategory, FeeError> {
        let mut uow = self.store.begin().await?;
        let mut category = load_category(uow.as_mut(), school_id, category_id).await?;
        category.deactivate();
        uow.update_category(&category).await?;
        uow.commit().await?;

        info!(category_id = %category.id, "Vote head deactivated");
        Ok(category)
    }

    /// Applies new priorities to several vote heads at once
    ///
    /// Either every vote head is updated or none is.
    #[instrument(skip(self, order), fields(school_id = %school_id, count = order.len()))]
    pub async fn reorder_categories(
        &self,
        school_id: SchoolId,
        order: &[(FeeCategoryId, i32)],
    ) -> Result<Vec<FeeCategory>, FeeError> {
        for (_, priority) in order {
            validate_priority(*priority)?;
        }

        let mut uow = self.store.begin().await?;
        let now = Utc::now();
        for &(category_id, priority) in order {
            let mut category = load_category(uow.as_mut(), school_id, category_id).await?;
            category.priority = priority;
            category.updated_at = now;
            uow.update_category(&category).await?;
        }
        let categories = uow.list_categories(school_id).await?;
        uow.commit().await?;
        Ok(categories)
    }

    /// Vote heads ordered by `(priority, id)`
    pub async fn list_categories(&self, school_id: SchoolId) -> Result<Vec<FeeCategory>, FeeError> {
        let mut uow = self.store.begin().await?;
        Ok(uow.list_categories(school_id).await?)
    }

    #[instrument(skip(self, academic_period), fields(school_id = %school_id, class_id = %class_id))]
    pub async fn create_schedule(
        &self,
        school_id: SchoolId,
        class_id: ClassId,
        total: Money,
        academic_period: &str,
    ) -> Result<FeeSchedule, FeeError> {
        let total = total.ensure_positive()?;
        let academic_period = academic_period.trim();
        if academic_period.is_empty() {
            return Err(FeeError::validation("academic period is required"));
        }

        let mut uow = self.store.begin().await?;
        let schedule = FeeSchedule::new(school_id, class_id, total, academic_period);
        uow.insert_schedule(&schedule).await?;
        uow.commit().await?;

        info!(schedule_id = %schedule.id, total = %schedule.total, "Fee schedule created");
        Ok(schedule)
    }

    /// Assigns part of a schedule to a vote head
    ///
    /// Items are not checked against the schedule total.
    pub async fn add_schedule_item(
        &self,
        school_id: SchoolId,
        schedule_id: FeeScheduleId,
        category_id: FeeCategoryId,
        amount: Money,
    ) -> Result<FeeScheduleItem, FeeError> {
        let amount = amount.ensure_positive()?;

        let mut uow = self.store.begin().await?;
        uow.get_schedule(school_id, schedule_id)
            .await?
            .ok_or(FeeError::ScheduleNotFound(schedule_id))?;
        load_category(uow.as_mut(), school_id, category_id).await?;

        let item = FeeScheduleItem::new(schedule_id, category_id, amount);
        uow.insert_schedule_item(&item).await?;
        uow.commit().await?;
        Ok(item)
    }

    pub async fn list_schedule_items(
        &self,
        school_id: SchoolId,
        schedule_id: FeeScheduleId,
    ) -> Result<Vec<FeeScheduleItem>, FeeError> {
        let mut uow = self.store.begin().await?;
        uow.get_schedule(school_id, schedule_id)
            .await?
            .ok_or(FeeError::ScheduleNotFound(schedule_id))?;
        Ok(uow.list_schedule_items(schedule_id).await?)
    }
}

async fn load_category(
    uow: &mut dyn FeeUnitOfWork,
    school_id: SchoolId,
    category_id: FeeCategoryId,
) -> Result<FeeCategory, FeeError> {
    uow.get_category(school_id, category_id)
        .await?
        .ok_or(FeeError::CategoryNotFound(category_id))
}

fn validate_name(name: &str) -> Result<&str, FeeError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FeeError::validation("vote head name is required"));
    }
    Ok(name)
}

fn validate_priority(priority: i32) -> Result<(), FeeError> {
    if priority < 1 {
        return Err(FeeError::validation(format!(
            "priority must be at least 1, got {}",
            priority
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::MockFeeStore;
    use rust_decimal_macros::dec;

    fn admin() -> FeeAdministration {
        FeeAdministration::new(Arc::new(MockFeeStore::new()))
    }

    #[tokio::test]
    async fn test_priority_auto_assignment() {
        let admin = admin();
        let school = SchoolId::new();

        let tuition = admin.create_category(school, "Tuition", None).await.unwrap();
        assert_eq!(tuition.priority, 1);

        admin.create_category(school, "Boarding", Some(5)).await.unwrap();
        let activity = admin.create_category(school, "Activity", None).await.unwrap();
        assert_eq!(activity.priority, 6);

        // Other schools start from 1
        let other = admin.create_category(SchoolId::new(), "Tuition", None).await.unwrap();
        assert_eq!(other.priority, 1);
    }

    #[tokio::test]
    async fn test_rejects_blank_name_and_bad_priority() {
        let admin = admin();
        let school = SchoolId::new();

        let err = admin.create_category(school, "  ", None).await.unwrap_err();
        assert!(matches!(err, FeeError::Validation(_)));
        let err = admin.create_category(school, "Tuition", Some(0)).await.unwrap_err();
        assert!(matches!(err, FeeError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reorder_is_all_or_nothing() {
        let admin = admin();
        let school = SchoolId::new();
        let tuition = admin.create_category(school, "Tuition", None).await.unwrap();
        let activity = admin.create_category(school, "Activity", None).await.unwrap();

        let err = admin
            .reorder_categories(school, &[(activity.id, 1), (FeeCategoryId::new(), 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::CategoryNotFound(_)));
        let listed = admin.list_categories(school).await.unwrap();
        assert_eq!(listed[0].id, tuition.id);

        let reordered = admin
            .reorder_categories(school, &[(activity.id, 1), (tuition.id, 2)])
            .await
            .unwrap();
        assert_eq!(reordered[0].id, activity.id);
        assert_eq!(reordered[1].id, tuition.id);
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let admin = admin();
        let school = SchoolId::new();
        let category = admin.create_category(school, "Lunch", None).await.unwrap();

        let updated = admin
            .update_category(
                school,
                category.id,
                CategoryUpdate {
                    name: Some("Lunch Programme".to_string()),
                    priority: Some(4),
                    is_active: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Lunch Programme");
        assert_eq!(updated.priority, 4);

        let deactivated = admin.deactivate_category(school, category.id).await.unwrap();
        assert!(!deactivated.is_active);

        let err = admin
            .deactivate_category(SchoolId::new(), category.id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_schedule_items_scoped_to_school() {
        let admin = admin();
        let school = SchoolId::new();
        let tuition = admin.create_category(school, "Tuition", None).await.unwrap();
        let schedule = admin
            .create_schedule(school, ClassId::new(), Money::new(dec!(15000)), "2024-T1")
            .await
            .unwrap();

        // Items may exceed the declared total
        admin
            .add_schedule_item(school, schedule.id, tuition.id, Money::new(dec!(20000)))
            .await
            .unwrap();
        assert_eq!(admin.list_schedule_items(school, schedule.id).await.unwrap().len(), 1);

        let err = admin
            .add_schedule_item(SchoolId::new(), schedule.id, tuition.id, Money::new(dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::ScheduleNotFound(_)));

        let err = admin
            .add_schedule_item(school, schedule.id, tuition.id, Money::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::InvalidAmount(_)));
    }
}
