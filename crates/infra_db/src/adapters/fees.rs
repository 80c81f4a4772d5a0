//! PostgreSQL Fee Store Adapter
//!
//! Implements `FeeStorePort` on PostgreSQL. Each unit of work owns one
//! `sqlx` transaction; dropping it without committing rolls back.
//!
//! # Concurrency
//!
//! - `lock_student` takes a transaction-scoped advisory lock keyed on
//!   `(school, student)`, so two payments for a student never interleave,
//!   even before the student has any balance rows to lock.
//! - `active_balances_for_update` locks the balance rows it returns.
//! - A second insert of the same M-PESA transaction id fails on the unique
//!   constraint and surfaces as `PortError::Conflict`.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool_from_url, PostgresFeeStore};
//! use domain_fees::PaymentService;
//! use std::sync::Arc;
//!
//! let pool = create_pool_from_url("postgres://localhost/school_fees").await?;
//! let store = Arc::new(PostgresFeeStore::new(pool));
//! let payments = PaymentService::new(store.clone());
//! ```

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, ClassId, DomainPort, ExternalTransactionId, FeeCategoryId, FeeScheduleId,
    HealthCheckResult, HealthCheckable, Money, PaymentId, PortError, SchoolId, StudentId,
};
use domain_fees::{
    Balance, ExternalTransaction, FeeCategory, FeeSchedule, FeeScheduleItem, FeeStorePort,
    FeeUnitOfWork, Payment, PaymentAllocation, PaymentMethod, PrioritizedBalance, Student,
    TransactionStatus,
};

use crate::error::DatabaseError;
use crate::repositories::fees::{
    self, BalanceRow, BalanceWithVoteHeadRow, FeeScheduleItemRow, FeeScheduleRow,
    MpesaTransactionRow, PaymentAllocationRow, PaymentRow, StudentRow, VoteHeadRow,
};

const ADAPTER_ID: &str = "postgres-fee-store";
const TRANS_ID_CONSTRAINT: &str = "uq_mpesa_transactions_trans_id";

/// PostgreSQL-backed implementation of `FeeStorePort`
#[derive(Debug, Clone)]
pub struct PostgresFeeStore {
    pool: PgPool,
}

impl PostgresFeeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Copies a student from the school directory into the local table
    ///
    /// The directory itself lives outside this system; this is how students
    /// become visible to allocation and M-PESA matching.
    #[instrument(skip(self, student), fields(student_id = %student.id))]
    pub async fn register_student(&self, student: &Student) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        fees::insert_student(&mut conn, &student_to_row(student)).await?;
        debug!("Student registered");
        Ok(())
    }
}

impl DomainPort for PostgresFeeStore {}

#[async_trait]
impl HealthCheckable for PostgresFeeStore {
    /// Runs `SELECT 1`; degraded when every pooled connection is busy
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) if pool_saturated(&self.pool) => {
                HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Degraded, latency_ms)
                    .with_message("all pooled connections in use")
            }
            Ok(_) => HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Healthy, latency_ms),
            Err(e) => HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Unhealthy, latency_ms)
                .with_message(format!("Database error: {}", e)),
        }
    }
}

fn pool_saturated(pool: &PgPool) -> bool {
    pool.num_idle() == 0 && pool.size() >= pool.options().get_max_connections()
}

#[async_trait]
impl FeeStorePort for PostgresFeeStore {
    async fn begin(&self) -> Result<Box<dyn FeeUnitOfWork>, PortError> {
        let tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        Ok(Box::new(PgFeeUnitOfWork { tx }))
    }
}

/// One PostgreSQL transaction
pub struct PgFeeUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl FeeUnitOfWork for PgFeeUnitOfWork {
    async fn find_student(
        &mut self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Option<Student>, PortError> {
        let row = fees::find_student(&mut self.tx, school_id.into(), student_id.into()).await?;
        Ok(row.map(row_to_student))
    }

    async fn find_students_by_enrollment(
        &mut self,
        enrollment_number: &str,
    ) -> Result<Vec<Student>, PortError> {
        let rows = fees::find_students_by_enrollment(&mut self.tx, enrollment_number).await?;
        Ok(rows.into_iter().map(row_to_student).collect())
    }

    async fn list_categories(&mut self, school_id: SchoolId) -> Result<Vec<FeeCategory>, PortError> {
        let rows = fees::list_vote_heads(&mut self.tx, school_id.into()).await?;
        Ok(rows.into_iter().map(row_to_category).collect())
    }

    async fn get_category(
        &mut self,
        school_id: SchoolId,
        category_id: FeeCategoryId,
    ) -> Result<Option<FeeCategory>, PortError> {
        let row = fees::get_vote_head(&mut self.tx, school_id.into(), category_id.into()).await?;
        Ok(row.map(row_to_category))
    }

    async fn max_priority(&mut self, school_id: SchoolId) -> Result<Option<i32>, PortError> {
        Ok(fees::max_priority(&mut self.tx, school_id.into()).await?)
    }

    async fn insert_category(&mut self, category: &FeeCategory) -> Result<(), PortError> {
        Ok(fees::insert_vote_head(&mut self.tx, &category_to_row(category)).await?)
    }

    async fn update_category(&mut self, category: &FeeCategory) -> Result<(), PortError> {
        Ok(fees::update_vote_head(&mut self.tx, &category_to_row(category)).await?)
    }

    async fn insert_schedule(&mut self, schedule: &FeeSchedule) -> Result<(), PortError> {
        let row = FeeScheduleRow {
            id: schedule.id.into(),
            school_id: schedule.school_id.into(),
            class_id: schedule.class_id.into(),
            total: schedule.total.amount(),
            academic_period: schedule.academic_period.clone(),
            created_at: schedule.created_at,
        };
        Ok(fees::insert_fee_schedule(&mut self.tx, &row).await?)
    }

    async fn get_schedule(
        &mut self,
        school_id: SchoolId,
        schedule_id: FeeScheduleId,
    ) -> Result<Option<FeeSchedule>, PortError> {
        let row = fees::get_fee_schedule(&mut self.tx, school_id.into(), schedule_id.into()).await?;
        Ok(row.map(row_to_schedule))
    }

    async fn latest_schedule_for_class(
        &mut self,
        school_id: SchoolId,
        class_id: ClassId,
    ) -> Result<Option<FeeSchedule>, PortError> {
        let row = fees::latest_fee_schedule(&mut self.tx, school_id.into(), class_id.into()).await?;
        Ok(row.map(row_to_schedule))
    }

    async fn insert_schedule_item(&mut self, item: &FeeScheduleItem) -> Result<(), PortError> {
        let row = FeeScheduleItemRow {
            id: item.id.into(),
            fee_schedule_id: item.schedule_id.into(),
            vote_head_id: item.category_id.into(),
            amount: item.amount.amount(),
            created_at: item.created_at,
        };
        Ok(fees::insert_fee_schedule_item(&mut self.tx, &row).await?)
    }

    async fn list_schedule_items(
        &mut self,
        schedule_id: FeeScheduleId,
    ) -> Result<Vec<FeeScheduleItem>, PortError> {
        let rows = fees::list_fee_schedule_items(&mut self.tx, schedule_id.into()).await?;
        Ok(rows
            .into_iter()
            .map(|row| FeeScheduleItem {
                id: row.id.into(),
                schedule_id: row.fee_schedule_id.into(),
                category_id: row.vote_head_id.into(),
                amount: Money::new(row.amount),
                created_at: row.created_at,
            })
            .collect())
    }

    #[instrument(skip(self), fields(school_id = %school_id, student_id = %student_id))]
    async fn lock_student(&mut self, school_id: SchoolId, student_id: StudentId) -> Result<(), PortError> {
        fees::lock_student(&mut self.tx, school_id.into(), student_id.into()).await?;
        debug!("Student lock acquired");
        Ok(())
    }

    async fn active_balances_for_update(
        &mut self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Vec<PrioritizedBalance>, PortError> {
        let rows = fees::active_balances_for_update(&mut self.tx, school_id.into(), student_id.into()).await?;
        Ok(rows.into_iter().map(row_to_prioritized).collect())
    }

    async fn all_balances(
        &mut self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Vec<PrioritizedBalance>, PortError> {
        let rows = fees::all_balances(&mut self.tx, school_id.into(), student_id.into()).await?;
        Ok(rows.into_iter().map(row_to_prioritized).collect())
    }

    async fn insert_balances(&mut self, balances: &[Balance]) -> Result<(), PortError> {
        for balance in balances {
            fees::insert_balance(&mut self.tx, &balance_to_row(balance)).await?;
        }
        Ok(())
    }

    async fn update_balances(&mut self, balances: &[Balance]) -> Result<(), PortError> {
        for balance in balances {
            fees::update_balance(&mut self.tx, &balance_to_row(balance)).await?;
        }
        Ok(())
    }

    async fn delete_balances(&mut self, school_id: SchoolId, student_id: StudentId) -> Result<u64, PortError> {
        Ok(fees::delete_balances(&mut self.tx, school_id.into(), student_id.into()).await?)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        let row = PaymentRow {
            id: payment.id.into(),
            student_id: payment.student_id.into(),
            school_id: payment.school_id.into(),
            amount: payment.amount.amount(),
            payment_method: payment.method.as_str().to_string(),
            reference: payment.reference.clone(),
            created_at: payment.created_at,
        };
        Ok(fees::insert_payment(&mut self.tx, &row).await?)
    }

    async fn get_payment(
        &mut self,
        school_id: SchoolId,
        payment_id: PaymentId,
    ) -> Result<Option<Payment>, PortError> {
        let row = fees::get_payment(&mut self.tx, school_id.into(), payment_id.into()).await?;
        row.map(row_to_payment).transpose()
    }

    async fn list_payments(
        &mut self,
        school_id: SchoolId,
        student_id: Option<StudentId>,
        limit: i64,
    ) -> Result<Vec<Payment>, PortError> {
        let rows = fees::list_payments(&mut self.tx, school_id.into(), student_id.map(Into::into), limit).await?;
        rows.into_iter().map(row_to_payment).collect()
    }

    async fn insert_allocations(&mut self, allocations: &[PaymentAllocation]) -> Result<(), PortError> {
        for allocation in allocations {
            let row = PaymentAllocationRow {
                id: allocation.id.into(),
                payment_id: allocation.payment_id.into(),
                vote_head_id: allocation.category_id.into(),
                amount: allocation.amount.amount(),
                bal_before: allocation.bal_before.amount(),
                bal_after: allocation.bal_after.amount(),
                created_at: allocation.created_at,
            };
            fees::insert_allocation(&mut self.tx, &row).await?;
        }
        Ok(())
    }

    async fn allocations_for_payment(&mut self, payment_id: PaymentId) -> Result<Vec<PaymentAllocation>, PortError> {
        let rows = fees::allocations_for_payment(&mut self.tx, payment_id.into()).await?;
        Ok(rows
            .into_iter()
            .map(|row| PaymentAllocation {
                id: row.id.into(),
                payment_id: row.payment_id.into(),
                category_id: row.vote_head_id.into(),
                amount: Money::new(row.amount),
                bal_before: Money::new(row.bal_before),
                bal_after: Money::new(row.bal_after),
                created_at: row.created_at,
            })
            .collect())
    }

    async fn find_external_by_trans_id(&mut self, trans_id: &str) -> Result<Option<ExternalTransaction>, PortError> {
        let row = fees::find_mpesa_by_trans_id(&mut self.tx, trans_id).await?;
        row.map(row_to_external).transpose()
    }

    async fn get_external(&mut self, id: ExternalTransactionId) -> Result<Option<ExternalTransaction>, PortError> {
        let row = fees::get_mpesa_transaction(&mut self.tx, id.into()).await?;
        row.map(row_to_external).transpose()
    }

    #[instrument(skip(self, transaction), fields(trans_id = %transaction.trans_id))]
    async fn insert_external(&mut self, transaction: &ExternalTransaction) -> Result<(), PortError> {
        fees::insert_mpesa_transaction(&mut self.tx, &external_to_row(transaction))
            .await
            .map_err(|e| {
                if e.violates(TRANS_ID_CONSTRAINT) {
                    PortError::conflict(format!(
                        "M-PESA transaction {} already recorded",
                        transaction.trans_id
                    ))
                } else {
                    e.into()
                }
            })
    }

    async fn update_external(&mut self, transaction: &ExternalTransaction) -> Result<(), PortError> {
        Ok(fees::update_mpesa_transaction(&mut self.tx, &external_to_row(transaction)).await?)
    }

    async fn list_external(
        &mut self,
        school_id: SchoolId,
        status: Option<TransactionStatus>,
        limit: i64,
    ) -> Result<Vec<ExternalTransaction>, PortError> {
        let status = status.map(|s| s.as_str());
        let rows = fees::list_mpesa_transactions(&mut self.tx, school_id.into(), status, limit).await?;
        rows.into_iter().map(row_to_external).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        self.tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn row_to_student(row: StudentRow) -> Student {
    Student {
        id: row.id.into(),
        school_id: row.school_id.into(),
        enrollment_number: row.enrollment_number,
        class_id: row.class_id.map(Into::into),
    }
}

fn student_to_row(student: &Student) -> StudentRow {
    StudentRow {
        id: student.id.into(),
        school_id: student.school_id.into(),
        enrollment_number: student.enrollment_number.clone(),
        class_id: student.class_id.map(Into::into),
    }
}

fn row_to_category(row: VoteHeadRow) -> FeeCategory {
    FeeCategory {
        id: row.id.into(),
        school_id: row.school_id.into(),
        name: row.name,
        priority: row.priority,
        is_active: row.is_active,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn category_to_row(category: &FeeCategory) -> VoteHeadRow {
    VoteHeadRow {
        id: category.id.into(),
        school_id: category.school_id.into(),
        name: category.name.clone(),
        priority: category.priority,
        is_active: category.is_active,
        created_at: category.created_at,
        updated_at: category.updated_at,
    }
}

fn row_to_schedule(row: FeeScheduleRow) -> FeeSchedule {
    FeeSchedule {
        id: row.id.into(),
        school_id: row.school_id.into(),
        class_id: row.class_id.into(),
        total: Money::new(row.total),
        academic_period: row.academic_period,
        created_at: row.created_at,
    }
}

fn balance_to_row(balance: &Balance) -> BalanceRow {
    BalanceRow {
        id: balance.id.into(),
        student_id: balance.student_id.into(),
        vote_head_id: balance.category_id.into(),
        school_id: balance.school_id.into(),
        balance: balance.amount.amount(),
        last_updated: balance.last_updated,
    }
}

fn row_to_prioritized(row: BalanceWithVoteHeadRow) -> PrioritizedBalance {
    let BalanceWithVoteHeadRow {
        balance,
        vote_head_name,
        priority,
    } = row;
    PrioritizedBalance {
        balance: Balance {
            id: balance.id.into(),
            student_id: balance.student_id.into(),
            category_id: balance.vote_head_id.into(),
            school_id: balance.school_id.into(),
            amount: Money::new(balance.balance),
            last_updated: balance.last_updated,
        },
        category_name: vote_head_name,
        priority,
    }
}

fn row_to_payment(row: PaymentRow) -> Result<Payment, PortError> {
    let method = PaymentMethod::parse(&row.payment_method).ok_or_else(|| {
        DatabaseError::corrupt("payments", format!("unknown payment method '{}'", row.payment_method))
    })?;
    Ok(Payment {
        id: row.id.into(),
        student_id: row.student_id.into(),
        school_id: row.school_id.into(),
        amount: Money::new(row.amount),
        method,
        reference: row.reference,
        created_at: row.created_at,
    })
}

fn row_to_external(row: MpesaTransactionRow) -> Result<ExternalTransaction, PortError> {
    let status = TransactionStatus::parse(&row.status).ok_or_else(|| {
        DatabaseError::corrupt("mpesa_transactions", format!("unknown status '{}'", row.status))
    })?;
    Ok(ExternalTransaction {
        id: row.id.into(),
        school_id: row.school_id.map(Into::into),
        transaction_type: row.transaction_type,
        trans_id: row.trans_id,
        trans_time: row.trans_time,
        trans_amount: Money::new(row.trans_amount),
        business_short_code: row.business_short_code,
        bill_ref_number: row.bill_ref_number,
        invoice_number: row.invoice_number,
        msisdn: row.msisdn,
        first_name: row.first_name,
        middle_name: row.middle_name,
        last_name: row.last_name,
        status,
        payment_id: row.payment_id.map(Into::into),
        matched_student_id: row.matched_student_id.map(Into::into),
        error_message: row.error_message,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn external_to_row(transaction: &ExternalTransaction) -> MpesaTransactionRow {
    MpesaTransactionRow {
        id: transaction.id.into(),
        school_id: transaction.school_id.map(Into::into),
        transaction_type: transaction.transaction_type.clone(),
        trans_id: transaction.trans_id.clone(),
        trans_time: transaction.trans_time.clone(),
        trans_amount: transaction.trans_amount.amount(),
        business_short_code: transaction.business_short_code.clone(),
        bill_ref_number: transaction.bill_ref_number.clone(),
        invoice_number: transaction.invoice_number.clone(),
        msisdn: transaction.msisdn.clone(),
        first_name: transaction.first_name.clone(),
        middle_name: transaction.middle_name.clone(),
        last_name: transaction.last_name.clone(),
        status: transaction.status.as_str().to_string(),
        payment_id: transaction.payment_id.map(Into::into),
        matched_student_id: transaction.matched_student_id.map(Into::into),
        error_message: transaction.error_message.clone(),
        created_at: transaction.created_at,
        updated_at: transaction.updated_at,
    }
}
