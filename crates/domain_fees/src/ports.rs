//! Fee Domain Ports
//!
//! The fee domain reads and writes through a unit of work so that every
//! balance read-modify-write and every allocation insert commit together.
//!
//! # Architecture
//!
//! - `FeeStorePort` opens units of work. One per service call.
//! - `FeeUnitOfWork` is a single transaction. Dropping it without calling
//!   `commit` rolls everything back.
//!
//! Adapters:
//!
//! - **PostgreSQL** (`infra_db::PostgresFeeStore`): one `sqlx` transaction,
//!   balance rows locked with `SELECT ... FOR UPDATE`
//! - **Mock** (`mock::MockFeeStore`): in-memory, for tests
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut uow = store.begin().await?;
//! uow.lock_student(school_id, student_id).await?;
//! let balances = uow.active_balances_for_update(school_id, student_id).await?;
//! // ...
//! uow.commit().await?;
//! ```

use async_trait::async_trait;

use core_kernel::{
    ClassId, DomainPort, ExternalTransactionId, FeeCategoryId, FeeScheduleId, HealthCheckable,
    PaymentId, PortError, SchoolId, StudentId,
};

use crate::balance::{Balance, PrioritizedBalance};
use crate::category::FeeCategory;
use crate::external::{ExternalTransaction, TransactionStatus};
use crate::payment::{Payment, PaymentAllocation};
use crate::schedule::{FeeSchedule, FeeScheduleItem};
use crate::student::Student;

/// Entry point to fee storage
#[async_trait]
pub trait FeeStorePort: DomainPort + HealthCheckable {
    /// Opens a new unit of work
    async fn begin(&self) -> Result<Box<dyn FeeUnitOfWork>, PortError>;
}

/// A single storage transaction
///
/// Every method runs inside the same transaction. Nothing is visible to other
/// units of work until `commit` returns.
#[async_trait]
pub trait FeeUnitOfWork: Send {
    // ========================================================================
    // Student directory (read-only)
    // ========================================================================

    /// Finds a student within a school
    async fn find_student(
        &mut self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Option<Student>, PortError>;

    /// Finds students by admission number across all schools
    ///
    /// Mobile-money callbacks carry no tenant, so the lookup is global. More
    /// than one hit means the reference is ambiguous.
    async fn find_students_by_enrollment(
        &mut self,
        enrollment_number: &str,
    ) -> Result<Vec<Student>, PortError>;

    // ========================================================================
    // Vote heads
    // ========================================================================

    /// Lists a school's vote heads ordered by `(priority, id)`
    async fn list_categories(&mut self, school_id: SchoolId) -> Result<Vec<FeeCategory>, PortError>;

    async fn get_category(
        &mut self,
        school_id: SchoolId,
        category_id: FeeCategoryId,
    ) -> Result<Option<FeeCategory>, PortError>;

    /// Highest priority in use by the school, if any vote heads exist
    async fn max_priority(&mut self, school_id: SchoolId) -> Result<Option<i32>, PortError>;

    async fn insert_category(&mut self, category: &FeeCategory) -> Result<(), PortError>;

    async fn update_category(&mut self, category: &FeeCategory) -> Result<(), PortError>;

    // ========================================================================
    // Fee schedules
    // ========================================================================

    async fn insert_schedule(&mut self, schedule: &FeeSchedule) -> Result<(), PortError>;

    async fn get_schedule(
        &mut self,
        school_id: SchoolId,
        schedule_id: FeeScheduleId,
    ) -> Result<Option<FeeSchedule>, PortError>;

    /// Most recently created schedule for a class
    async fn latest_schedule_for_class(
        &mut self,
        school_id: SchoolId,
        class_id: ClassId,
    ) -> Result<Option<FeeSchedule>, PortError>;

    async fn insert_schedule_item(&mut self, item: &FeeScheduleItem) -> Result<(), PortError>;

    async fn list_schedule_items(
        &mut self,
        schedule_id: FeeScheduleId,
    ) -> Result<Vec<FeeScheduleItem>, PortError>;

    // ========================================================================
    // Balances
    // ========================================================================

    /// Serializes balance work for one student until the unit of work ends
    ///
    /// Covers the window where a student has no balance rows yet and two
    /// payments would otherwise both materialize them.
    async fn lock_student(&mut self, school_id: SchoolId, student_id: StudentId)
        -> Result<(), PortError>;

    /// Balances on active vote heads, ordered by `(priority, vote head id)`,
    /// locked against concurrent update
    async fn active_balances_for_update(
        &mut self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Vec<PrioritizedBalance>, PortError>;

    /// Every balance of the student, active vote head or not, ordered by
    /// `(priority, vote head id)`
    async fn all_balances(
        &mut self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Vec<PrioritizedBalance>, PortError>;

    async fn insert_balances(&mut self, balances: &[Balance]) -> Result<(), PortError>;

    async fn update_balances(&mut self, balances: &[Balance]) -> Result<(), PortError>;

    /// Deletes every balance of the student, returning the number removed
    async fn delete_balances(
        &mut self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<u64, PortError>;

    // ========================================================================
    // Payments
    // ========================================================================

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    async fn get_payment(
        &mut self,
        school_id: SchoolId,
        payment_id: PaymentId,
    ) -> Result<Option<Payment>, PortError>;

    /// Newest first
    async fn list_payments(
        &mut self,
        school_id: SchoolId,
        student_id: Option<StudentId>,
        limit: i64,
    ) -> Result<Vec<Payment>, PortError>;

    async fn insert_allocations(&mut self, allocations: &[PaymentAllocation])
        -> Result<(), PortError>;

    async fn allocations_for_payment(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<Vec<PaymentAllocation>, PortError>;

    // ========================================================================
    // External transactions
    // ========================================================================

    async fn find_external_by_trans_id(
        &mut self,
        trans_id: &str,
    ) -> Result<Option<ExternalTransaction>, PortError>;

    async fn get_external(
        &mut self,
        id: ExternalTransactionId,
    ) -> Result<Option<ExternalTransaction>, PortError>;

    /// Inserts a transaction; `PortError::Conflict` if the network
    /// transaction id is already stored
    async fn insert_external(&mut self, transaction: &ExternalTransaction) -> Result<(), PortError>;

    async fn update_external(&mut self, transaction: &ExternalTransaction) -> Result<(), PortError>;

    /// The school's transactions plus unassigned ones, newest first
    async fn list_external(
        &mut self,
        school_id: SchoolId,
        status: Option<TransactionStatus>,
        limit: i64,
    ) -> Result<Vec<ExternalTransaction>, PortError>;

    /// Makes every change visible
    async fn commit(self: Box<Self>) -> Result<(), PortError>;
}

/// Mock implementation for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    use core_kernel::{AdapterHealth, BalanceId, HealthCheckResult};

    #[derive(Debug, Clone, Default)]
    struct MockState {
        students: HashMap<StudentId, Student>,
        categories: HashMap<FeeCategoryId, FeeCategory>,
        schedules: HashMap<FeeScheduleId, FeeSchedule>,
        schedule_items: Vec<FeeScheduleItem>,
        balances: HashMap<BalanceId, Balance>,
        payments: HashMap<PaymentId, Payment>,
        allocations: Vec<PaymentAllocation>,
        external: HashMap<ExternalTransactionId, ExternalTransaction>,
    }

    impl MockState {
        fn prioritized(&self, balance: &Balance) -> Option<(PrioritizedBalance, bool)> {
            self.categories.get(&balance.category_id).map(|category| {
                (
                    PrioritizedBalance {
                        balance: balance.clone(),
                        category_name: category.name.clone(),
                        priority: category.priority,
                    },
                    category.is_active,
                )
            })
        }

        fn student_balances(
            &self,
            school_id: SchoolId,
            student_id: StudentId,
            active_only: bool,
        ) -> Vec<PrioritizedBalance> {
            let mut rows: Vec<PrioritizedBalance> = self
                .balances
                .values()
                .filter(|b| b.school_id == school_id && b.student_id == student_id)
                .filter_map(|b| self.prioritized(b))
                .filter(|(_, active)| !active_only || *active)
                .map(|(row, _)| row)
                .collect();
            rows.sort_by_key(PrioritizedBalance::sort_key);
            rows
        }
    }

    #[derive(Debug, Default)]
    struct Faults {
        payment_inserts: AtomicBool,
        allocation_inserts: AtomicBool,
    }

    /// In-memory fee store
    ///
    /// Units of work are serialized on one mutex; each works on a copy of the
    /// state that replaces the shared state on commit.
    #[derive(Debug, Clone, Default)]
    pub struct MockFeeStore {
        state: Arc<Mutex<MockState>>,
        faults: Arc<Faults>,
    }

    impl MockFeeStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds a student to the directory
        pub async fn add_student(&self, student: Student) {
            self.state.lock().await.students.insert(student.id, student);
        }

        /// Makes every subsequent payment insert fail
        pub fn fail_payment_inserts(&self, fail: bool) {
            self.faults.payment_inserts.store(fail, Ordering::SeqCst);
        }

        /// Makes every subsequent allocation insert fail
        pub fn fail_allocation_inserts(&self, fail: bool) {
            self.faults.allocation_inserts.store(fail, Ordering::SeqCst);
        }

        /// Committed balances of a student, in allocation order
        pub async fn balances_of(&self, school_id: SchoolId, student_id: StudentId) -> Vec<PrioritizedBalance> {
            self.state
                .lock()
                .await
                .student_balances(school_id, student_id, false)
        }

        /// Every committed payment
        pub async fn payments(&self) -> Vec<Payment> {
            self.state.lock().await.payments.values().cloned().collect()
        }

        /// Every committed allocation row
        pub async fn allocations(&self) -> Vec<PaymentAllocation> {
            self.state.lock().await.allocations.clone()
        }

        /// Every committed external transaction
        pub async fn external_transactions(&self) -> Vec<ExternalTransaction> {
            self.state.lock().await.external.values().cloned().collect()
        }
    }

    impl DomainPort for MockFeeStore {}

    #[async_trait]
    impl HealthCheckable for MockFeeStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::new("mock-fee-store", AdapterHealth::Healthy, 0)
                .with_message("Mock adapter always healthy")
        }
    }

    #[async_trait]
    impl FeeStorePort for MockFeeStore {
        async fn begin(&self) -> Result<Box<dyn FeeUnitOfWork>, PortError> {
            let guard = self.state.clone().lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(MockUnitOfWork {
                guard,
                working,
                faults: self.faults.clone(),
            }))
        }
    }

    struct MockUnitOfWork {
        guard: OwnedMutexGuard<MockState>,
        working: MockState,
        faults: Arc<Faults>,
    }

    #[async_trait]
    impl FeeUnitOfWork for MockUnitOfWork {
        async fn find_student(
            &mut self,
            school_id: SchoolId,
            student_id: StudentId,
        ) -> Result<Option<Student>, PortError> {
            Ok(self
                .working
                .students
                .get(&student_id)
                .filter(|s| s.school_id == school_id)
                .cloned())
        }

        async fn find_students_by_enrollment(
            &mut self,
            enrollment_number: &str,
        ) -> Result<Vec<Student>, PortError> {
            Ok(self
                .working
                .students
                .values()
                .filter(|s| s.enrollment_number == enrollment_number)
                .cloned()
                .collect())
        }

        async fn list_categories(&mut self, school_id: SchoolId) -> Result<Vec<FeeCategory>, PortError> {
            let mut categories: Vec<FeeCategory> = self
                .working
                .categories
                .values()
                .filter(|c| c.school_id == school_id)
                .cloned()
                .collect();
            categories.sort_by_key(FeeCategory::allocation_key);
            Ok(categories)
        }

        async fn get_category(
            &mut self,
            school_id: SchoolId,
            category_id: FeeCategoryId,
        ) -> Result<Option<FeeCategory>, PortError> {
            Ok(self
                .working
                .categories
                .get(&category_id)
                .filter(|c| c.school_id == school_id)
                .cloned())
        }

        async fn max_priority(&mut self, school_id: SchoolId) -> Result<Option<i32>, PortError> {
            Ok(self
                .working
                .categories
                .values()
                .filter(|c| c.school_id == school_id)
                .map(|c| c.priority)
                .max())
        }

        async fn insert_category(&mut self, category: &FeeCategory) -> Result<(), PortError> {
            self.working.categories.insert(category.id, category.clone());
            Ok(())
        }

        async fn update_category(&mut self, category: &FeeCategory) -> Result<(), PortError> {
            match self.working.categories.get_mut(&category.id) {
                Some(existing) => {
                    *existing = category.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("FeeCategory", category.id)),
            }
        }

        async fn insert_schedule(&mut self, schedule: &FeeSchedule) -> Result<(), PortError> {
            self.working.schedules.insert(schedule.id, schedule.clone());
            Ok(())
        }

        async fn get_schedule(
            &mut self,
            school_id: SchoolId,
            schedule_id: FeeScheduleId,
        ) -> Result<Option<FeeSchedule>, PortError> {
            Ok(self
                .working
                .schedules
                .get(&schedule_id)
                .filter(|s| s.school_id == school_id)
                .cloned())
        }

        async fn latest_schedule_for_class(
            &mut self,
            school_id: SchoolId,
            class_id: ClassId,
        ) -> Result<Option<FeeSchedule>, PortError> {
            Ok(self
                .working
                .schedules
                .values()
                .filter(|s| s.school_id == school_id && s.class_id == class_id)
                .max_by_key(|s| (s.created_at, s.id))
                .cloned())
        }

        async fn insert_schedule_item(&mut self, item: &FeeScheduleItem) -> Result<(), PortError> {
            self.working.schedule_items.push(item.clone());
            Ok(())
        }

        async fn list_schedule_items(
            &mut self,
            schedule_id: FeeScheduleId,
        ) -> Result<Vec<FeeScheduleItem>, PortError> {
            Ok(self
                .working
                .schedule_items
                .iter()
                .filter(|i| i.schedule_id == schedule_id)
                .cloned()
                .collect())
        }

        async fn lock_student(
            &mut self,
            _school_id: SchoolId,
            _student_id: StudentId,
        ) -> Result<(), PortError> {
            // The store-wide guard already excludes every other unit of work
            Ok(())
        }

        async fn active_balances_for_update(
            &mut self,
            school_id: SchoolId,
            student_id: StudentId,
        ) -> Result<Vec<PrioritizedBalance>, PortError> {
            Ok(self.working.student_balances(school_id, student_id, true))
        }

        async fn all_balances(
            &mut self,
            school_id: SchoolId,
            student_id: StudentId,
        ) -> Result<Vec<PrioritizedBalance>, PortError> {
            Ok(self.working.student_balances(school_id, student_id, false))
        }

        async fn insert_balances(&mut self, balances: &[Balance]) -> Result<(), PortError> {
            for balance in balances {
                self.working.balances.insert(balance.id, balance.clone());
            }
            Ok(())
        }

        async fn update_balances(&mut self, balances: &[Balance]) -> Result<(), PortError> {
            for balance in balances {
                match self.working.balances.get_mut(&balance.id) {
                    Some(existing) => *existing = balance.clone(),
                    None => return Err(PortError::not_found("Balance", balance.id)),
                }
            }
            Ok(())
        }

        async fn delete_balances(
            &mut self,
            school_id: SchoolId,
            student_id: StudentId,
        ) -> Result<u64, PortError> {
            let before = self.working.balances.len();
            self.working
                .balances
                .retain(|_, b| !(b.school_id == school_id && b.student_id == student_id));
            Ok((before - self.working.balances.len()) as u64)
        }

        async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
            if self.faults.payment_inserts.load(Ordering::SeqCst) {
                return Err(PortError::connection("injected payment insert failure"));
            }
            self.working.payments.insert(payment.id, payment.clone());
            Ok(())
        }

        async fn get_payment(
            &mut self,
            school_id: SchoolId,
            payment_id: PaymentId,
        ) -> Result<Option<Payment>, PortError> {
            Ok(self
                .working
                .payments
                .get(&payment_id)
                .filter(|p| p.school_id == school_id)
                .cloned())
        }

        async fn list_payments(
            &mut self,
            school_id: SchoolId,
            student_id: Option<StudentId>,
            limit: i64,
        ) -> Result<Vec<Payment>, PortError> {
            let mut payments: Vec<Payment> = self
                .working
                .payments
                .values()
                .filter(|p| p.school_id == school_id)
                .filter(|p| student_id.map_or(true, |id| p.student_id == id))
                .cloned()
                .collect();
            payments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            payments.truncate(limit.max(0) as usize);
            Ok(payments)
        }

        async fn insert_allocations(
            &mut self,
            allocations: &[PaymentAllocation],
        ) -> Result<(), PortError> {
            if self.faults.allocation_inserts.load(Ordering::SeqCst) {
                return Err(PortError::connection("injected allocation insert failure"));
            }
            self.working.allocations.extend_from_slice(allocations);
            Ok(())
        }

        async fn allocations_for_payment(
            &mut self,
            payment_id: PaymentId,
        ) -> Result<Vec<PaymentAllocation>, PortError> {
            Ok(self
                .working
                .allocations
                .iter()
                .filter(|a| a.payment_id == payment_id)
                .cloned()
                .collect())
        }

        async fn find_external_by_trans_id(
            &mut self,
            trans_id: &str,
        ) -> Result<Option<ExternalTransaction>, PortError> {
            Ok(self
                .working
                .external
                .values()
                .find(|t| t.trans_id == trans_id)
                .cloned())
        }

        async fn get_external(
            &mut self,
            id: ExternalTransactionId,
        ) -> Result<Option<ExternalTransaction>, PortError> {
            Ok(self.working.external.get(&id).cloned())
        }

        async fn insert_external(&mut self, transaction: &ExternalTransaction) -> Result<(), PortError> {
            if self
                .working
                .external
                .values()
                .any(|t| t.trans_id == transaction.trans_id)
            {
                return Err(PortError::conflict(format!(
                    "external transaction {} already exists",
                    transaction.trans_id
                )));
            }
            self.working.external.insert(transaction.id, transaction.clone());
            Ok(())
        }

        async fn update_external(&mut self, transaction: &ExternalTransaction) -> Result<(), PortError> {
            match self.working.external.get_mut(&transaction.id) {
                Some(existing) => {
                    *existing = transaction.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("ExternalTransaction", transaction.id)),
            }
        }

        async fn list_external(
            &mut self,
            school_id: SchoolId,
            status: Option<TransactionStatus>,
            limit: i64,
        ) -> Result<Vec<ExternalTransaction>, PortError> {
            let mut rows: Vec<ExternalTransaction> = self
                .working
                .external
                .values()
                .filter(|t| t.school_id.map_or(true, |id| id == school_id))
                .filter(|t| status.map_or(true, |s| t.status == s))
                .cloned()
                .collect();
            rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            rows.truncate(limit.max(0) as usize);
            Ok(rows)
        }

        async fn commit(self: Box<Self>) -> Result<(), PortError> {
            let MockUnitOfWork {
                mut guard, working, ..
            } = *self;
            *guard = working;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockFeeStore;
    use super::*;
    use chrono::Utc;
    use core_kernel::{AdapterHealth, Money};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_commit_makes_changes_visible() {
        let store = MockFeeStore::new();
        let school = SchoolId::new();

        let mut uow = store.begin().await.unwrap();
        uow.insert_category(&FeeCategory::new(school, "Tuition", 1))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.list_categories(school).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_drop_rolls_back() {
        let store = MockFeeStore::new();
        let school = SchoolId::new();

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_category(&FeeCategory::new(school, "Tuition", 1))
                .await
                .unwrap();
        }

        let mut uow = store.begin().await.unwrap();
        assert!(uow.list_categories(school).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mock_duplicate_external_is_conflict() {
        let store = MockFeeStore::new();
        let notification = crate::external::C2bNotification {
            transaction_type: "Pay Bill".to_string(),
            trans_id: "X1".to_string(),
            trans_time: String::new(),
            trans_amount: dec!(5000),
            business_short_code: String::new(),
            bill_ref_number: "ADM-001".to_string(),
            invoice_number: String::new(),
            msisdn: String::new(),
            first_name: String::new(),
            middle_name: String::new(),
            last_name: String::new(),
        };

        let mut uow = store.begin().await.unwrap();
        uow.insert_external(&ExternalTransaction::from_notification(&notification))
            .await
            .unwrap();
        let err = uow
            .insert_external(&ExternalTransaction::from_notification(&notification))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_mock_inactive_balances_filtered() {
        let store = MockFeeStore::new();
        let school = SchoolId::new();
        let student = StudentId::new();
        let tuition = FeeCategory::new(school, "Tuition", 1);
        let mut activity = FeeCategory::new(school, "Activity", 2);
        activity.deactivate();

        let mut uow = store.begin().await.unwrap();
        uow.insert_category(&tuition).await.unwrap();
        uow.insert_category(&activity).await.unwrap();
        uow.insert_balances(&[
            Balance::new(student, tuition.id, school, Money::new(dec!(100)), Utc::now()),
            Balance::new(student, activity.id, school, Money::new(dec!(50)), Utc::now()),
        ])
        .await
        .unwrap();

        assert_eq!(uow.active_balances_for_update(school, student).await.unwrap().len(), 1);
        assert_eq!(uow.all_balances(school, student).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let store = MockFeeStore::new();
        let result = store.health_check().await;
        assert_eq!(result.status, AdapterHealth::Healthy);
    }
}
