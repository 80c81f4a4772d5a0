//! Fee schedule resolution

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use core_kernel::{FeeCategoryId, SchoolId, StudentId};

use crate::balance::Balance;
use crate::error::FeeError;
use crate::ports::{FeeStorePort, FeeUnitOfWork};

/// Materializes a student's initial balances from their class fee schedule
pub struct FeeScheduleResolver {
    store: Arc<dyn FeeStorePort>,
}

impl FeeScheduleResolver {
    pub fn new(store: Arc<dyn FeeStorePort>) -> Self {
        Self { store }
    }

    /// Creates one balance per item of the class's latest fee schedule
    ///
    /// Existing balances are not checked; callers invoke this only for a
    /// student with none, otherwise duplicates are created.
    ///
    /// # Errors
    ///
    /// - `StudentNotFound` if the student is not in the school
    /// - `NotAssigned` if the student has no class
    /// - `NoSchedule` if the class has no fee schedule
    #[instrument(skip(self), fields(student_id = %student_id, school_id = %school_id))]
    pub async fn resolve_initial_balances(
        &self,
        student_id: StudentId,
        school_id: SchoolId,
    ) -> Result<Vec<Balance>, FeeError> {
        let mut uow = self.store.begin().await?;
        let balances = Self::resolve_in(uow.as_mut(), student_id, school_id).await?;
        uow.commit().await?;
        Ok(balances)
    }

    /// Same as `resolve_initial_balances`, inside the caller's unit of work
    pub async fn resolve_in(
        uow: &mut dyn FeeUnitOfWork,
        student_id: StudentId,
        school_id: SchoolId,
    ) -> Result<Vec<Balance>, FeeError> {
        Self::materialize(uow, student_id, school_id, &HashSet::new()).await
    }

    /// Materializes only the schedule items whose vote head has no balance
    /// row for the student yet, active or not
    ///
    /// Safe to call repeatedly; a student with every item already present
    /// gets nothing new.
    pub async fn resolve_missing_in(
        uow: &mut dyn FeeUnitOfWork,
        student_id: StudentId,
        school_id: SchoolId,
    ) -> Result<Vec<Balance>, FeeError> {
        let existing: HashSet<FeeCategoryId> = uow
            .all_balances(school_id, student_id)
            .await?
            .iter()
            .map(|row| row.balance.category_id)
            .collect();
        Self::materialize(uow, student_id, school_id, &existing).await
    }

    async fn materialize(
        uow: &mut dyn FeeUnitOfWork,
        student_id: StudentId,
        school_id: SchoolId,
        skip: &HashSet<FeeCategoryId>,
    ) -> Result<Vec<Balance>, FeeError> {
        let student = uow
            .find_student(school_id, student_id)
            .await?
            .ok_or_else(|| FeeError::StudentNotFound(student_id.to_string()))?;
        let class_id = student.class_id.ok_or(FeeError::NotAssigned(student_id))?;

        let schedule = uow
            .latest_schedule_for_class(school_id, class_id)
            .await?
            .ok_or(FeeError::NoSchedule(class_id))?;
        let items = uow.list_schedule_items(schedule.id).await?;

        let now = Utc::now();
        let balances: Vec<Balance> = items
            .iter()
            .filter(|item| !skip.contains(&item.category_id))
            .map(|item| Balance::new(student_id, item.category_id, school_id, item.amount, now))
            .collect();
        uow.insert_balances(&balances).await?;

        debug!(
            schedule_id = %schedule.id,
            count = balances.len(),
            "Materialized initial balances"
        );
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::FeeCategory;
    use crate::ports::mock::MockFeeStore;
    use crate::schedule::{FeeSchedule, FeeScheduleItem};
    use crate::student::Student;
    use core_kernel::{ClassId, Money};
    use rust_decimal_macros::dec;

    async fn seed(store: &MockFeeStore, school: SchoolId, class: ClassId) -> FeeCategory {
        let tuition = FeeCategory::new(school, "Tuition", 1);
        let schedule = FeeSchedule::new(school, class, Money::new(dec!(10000)), "2024");
        let mut uow = store.begin().await.unwrap();
        uow.insert_category(&tuition).await.unwrap();
        uow.insert_schedule(&schedule).await.unwrap();
        uow.insert_schedule_item(&FeeScheduleItem::new(
            schedule.id,
            tuition.id,
            Money::new(dec!(10000)),
        ))
        .await
        .unwrap();
        uow.commit().await.unwrap();
        tuition
    }

    #[tokio::test]
    async fn test_resolves_balances_from_schedule() {
        let store = MockFeeStore::new();
        let school = SchoolId::new();
        let class = ClassId::new();
        let tuition = seed(&store, school, class).await;
        let student = Student::new(school, "ADM-001", Some(class));
        store.add_student(student.clone()).await;

        let resolver = FeeScheduleResolver::new(Arc::new(store.clone()));
        let balances = resolver
            .resolve_initial_balances(student.id, school)
            .await
            .unwrap();

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].category_id, tuition.id);
        assert_eq!(balances[0].amount, Money::new(dec!(10000)));
        assert_eq!(store.balances_of(school, student.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_student_without_class_is_not_assigned() {
        let store = MockFeeStore::new();
        let school = SchoolId::new();
        let student = Student::new(school, "ADM-002", None);
        store.add_student(student.clone()).await;

        let resolver = FeeScheduleResolver::new(Arc::new(store));
        let err = resolver
            .resolve_initial_balances(student.id, school)
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::NotAssigned(id) if id == student.id));
    }

    #[tokio::test]
    async fn test_class_without_schedule() {
        let store = MockFeeStore::new();
        let school = SchoolId::new();
        let class = ClassId::new();
        let student = Student::new(school, "ADM-003", Some(class));
        store.add_student(student.clone()).await;

        let resolver = FeeScheduleResolver::new(Arc::new(store));
        let err = resolver
            .resolve_initial_balances(student.id, school)
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::NoSchedule(id) if id == class));
    }

    #[tokio::test]
    async fn test_student_from_other_school_not_found() {
        let store = MockFeeStore::new();
        let student = Student::new(SchoolId::new(), "ADM-004", Some(ClassId::new()));
        store.add_student(student.clone()).await;

        let resolver = FeeScheduleResolver::new(Arc::new(store));
        let err = resolver
            .resolve_initial_balances(student.id, SchoolId::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_repeated_resolution_duplicates_balances() {
        let store = MockFeeStore::new();
        let school = SchoolId::new();
        let class = ClassId::new();
        seed(&store, school, class).await;
        let student = Student::new(school, "ADM-005", Some(class));
        store.add_student(student.clone()).await;

        let resolver = FeeScheduleResolver::new(Arc::new(store.clone()));
        resolver.resolve_initial_balances(student.id, school).await.unwrap();
        resolver.resolve_initial_balances(student.id, school).await.unwrap();

        assert_eq!(store.balances_of(school, student.id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_missing_skips_existing_vote_heads() {
        let store = MockFeeStore::new();
        let school = SchoolId::new();
        let class = ClassId::new();
        seed(&store, school, class).await;
        let student = Student::new(school, "ADM-006", Some(class));
        store.add_student(student.clone()).await;

        let mut uow = store.begin().await.unwrap();
        let first = FeeScheduleResolver::resolve_missing_in(uow.as_mut(), student.id, school)
            .await
            .unwrap();
        let second = FeeScheduleResolver::resolve_missing_in(uow.as_mut(), student.id, school)
            .await
            .unwrap();
        uow.commit().await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(store.balances_of(school, student.id).await.len(), 1);
    }
}
