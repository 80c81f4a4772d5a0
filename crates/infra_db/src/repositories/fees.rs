//! Fee repository implementation
//!
//! Row types and queries for vote heads, fee schedules, balances, payments
//! and M-PESA transactions. Every function takes the connection of an open
//! transaction so callers decide what commits together.
//!
//! Queries are checked at runtime; the schema lives in
//! `migrations/20240101_000001_initial_schema.sql`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::DatabaseError;

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StudentRow {
    pub id: Uuid,
    pub school_id: Uuid,
    pub enrollment_number: String,
    pub class_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct VoteHeadRow {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FeeScheduleRow {
    pub id: Uuid,
    pub school_id: Uuid,
    pub class_id: Uuid,
    pub total: Decimal,
    pub academic_period: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FeeScheduleItemRow {
    pub id: Uuid,
    pub fee_schedule_id: Uuid,
    pub vote_head_id: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Balance row as stored
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct BalanceRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub vote_head_id: Uuid,
    pub school_id: Uuid,
    pub balance: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// Balance row joined to its vote head
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct BalanceWithVoteHeadRow {
    #[sqlx(flatten)]
    pub balance: BalanceRow,
    pub vote_head_name: String,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub school_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PaymentAllocationRow {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub vote_head_id: Uuid,
    pub amount: Decimal,
    pub bal_before: Decimal,
    pub bal_after: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MpesaTransactionRow {
    pub id: Uuid,
    pub school_id: Option<Uuid>,
    pub transaction_type: String,
    pub trans_id: String,
    pub trans_time: String,
    pub trans_amount: Decimal,
    pub business_short_code: String,
    pub bill_ref_number: String,
    pub invoice_number: String,
    pub msisdn: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub status: String,
    pub payment_id: Option<Uuid>,
    pub matched_student_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const MPESA_COLUMNS: &str = r#"
    id, school_id, transaction_type, trans_id, trans_time, trans_amount,
    business_short_code, bill_ref_number, invoice_number, msisdn,
    first_name, middle_name, last_name, status, payment_id,
    matched_student_id, error_message, created_at, updated_at
"#;

const BALANCE_JOIN: &str = r#"
    SELECT b.id, b.student_id, b.vote_head_id, b.school_id, b.balance, b.last_updated,
           v.name AS vote_head_name, v.priority
    FROM vote_head_balances b
    JOIN vote_heads v ON v.id = b.vote_head_id
    WHERE b.school_id = $1 AND b.student_id = $2
"#;

// ============================================================================
// Students
// ============================================================================

pub async fn find_student(
    conn: &mut PgConnection,
    school_id: Uuid,
    student_id: Uuid,
) -> Result<Option<StudentRow>, DatabaseError> {
    let row = sqlx::query_as::<_, StudentRow>(
        r#"
        SELECT id, school_id, enrollment_number, class_id
        FROM students
        WHERE id = $1 AND school_id = $2
        "#,
    )
    .bind(student_id)
    .bind(school_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Exact admission number match across all schools
pub async fn find_students_by_enrollment(
    conn: &mut PgConnection,
    enrollment_number: &str,
) -> Result<Vec<StudentRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, StudentRow>(
        r#"
        SELECT id, school_id, enrollment_number, class_id
        FROM students
        WHERE enrollment_number = $1
        ORDER BY id
        "#,
    )
    .bind(enrollment_number)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Adds a student to the local directory copy
pub async fn insert_student(conn: &mut PgConnection, row: &StudentRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO students (id, school_id, enrollment_number, class_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(row.id)
    .bind(row.school_id)
    .bind(&row.enrollment_number)
    .bind(row.class_id)
    .execute(conn)
    .await?;

    Ok(())
}

// ============================================================================
// Vote heads
// ============================================================================

pub async fn list_vote_heads(
    conn: &mut PgConnection,
    school_id: Uuid,
) -> Result<Vec<VoteHeadRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, VoteHeadRow>(
        r#"
        SELECT id, school_id, name, priority, is_active, created_at, updated_at
        FROM vote_heads
        WHERE school_id = $1
        ORDER BY priority, id
        "#,
    )
    .bind(school_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

pub async fn get_vote_head(
    conn: &mut PgConnection,
    school_id: Uuid,
    id: Uuid,
) -> Result<Option<VoteHeadRow>, DatabaseError> {
    let row = sqlx::query_as::<_, VoteHeadRow>(
        r#"
        SELECT id, school_id, name, priority, is_active, created_at, updated_at
        FROM vote_heads
        WHERE id = $1 AND school_id = $2
        "#,
    )
    .bind(id)
    .bind(school_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

pub async fn max_priority(conn: &mut PgConnection, school_id: Uuid) -> Result<Option<i32>, DatabaseError> {
    let max = sqlx::query_scalar::<_, Option<i32>>(
        "SELECT MAX(priority) FROM vote_heads WHERE school_id = $1",
    )
    .bind(school_id)
    .fetch_one(conn)
    .await?;

    Ok(max)
}

pub async fn insert_vote_head(conn: &mut PgConnection, row: &VoteHeadRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO vote_heads (id, school_id, name, priority, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(row.id)
    .bind(row.school_id)
    .bind(&row.name)
    .bind(row.priority)
    .bind(row.is_active)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn update_vote_head(conn: &mut PgConnection, row: &VoteHeadRow) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE vote_heads
        SET name = $3, priority = $4, is_active = $5, updated_at = $6
        WHERE id = $1 AND school_id = $2
        "#,
    )
    .bind(row.id)
    .bind(row.school_id)
    .bind(&row.name)
    .bind(row.priority)
    .bind(row.is_active)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("VoteHead", row.id));
    }
    Ok(())
}

// ============================================================================
// Fee schedules
// ============================================================================

pub async fn insert_fee_schedule(conn: &mut PgConnection, row: &FeeScheduleRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO fee_schedules (id, school_id, class_id, total, academic_period, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(row.id)
    .bind(row.school_id)
    .bind(row.class_id)
    .bind(row.total)
    .bind(&row.academic_period)
    .bind(row.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn get_fee_schedule(
    conn: &mut PgConnection,
    school_id: Uuid,
    id: Uuid,
) -> Result<Option<FeeScheduleRow>, DatabaseError> {
    let row = sqlx::query_as::<_, FeeScheduleRow>(
        r#"
        SELECT id, school_id, class_id, total, academic_period, created_at
        FROM fee_schedules
        WHERE id = $1 AND school_id = $2
        "#,
    )
    .bind(id)
    .bind(school_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Most recently created schedule of a class
pub async fn latest_fee_schedule(
    conn: &mut PgConnection,
    school_id: Uuid,
    class_id: Uuid,
) -> Result<Option<FeeScheduleRow>, DatabaseError> {
    let row = sqlx::query_as::<_, FeeScheduleRow>(
        r#"
        SELECT id, school_id, class_id, total, academic_period, created_at
        FROM fee_schedules
        WHERE school_id = $1 AND class_id = $2
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(school_id)
    .bind(class_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

pub async fn insert_fee_schedule_item(
    conn: &mut PgConnection,
    row: &FeeScheduleItemRow,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO fee_schedule_items (id, fee_schedule_id, vote_head_id, amount, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(row.id)
    .bind(row.fee_schedule_id)
    .bind(row.vote_head_id)
    .bind(row.amount)
    .bind(row.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn list_fee_schedule_items(
    conn: &mut PgConnection,
    fee_schedule_id: Uuid,
) -> Result<Vec<FeeScheduleItemRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, FeeScheduleItemRow>(
        r#"
        SELECT id, fee_schedule_id, vote_head_id, amount, created_at
        FROM fee_schedule_items
        WHERE fee_schedule_id = $1
        ORDER BY created_at, id
        "#,
    )
    .bind(fee_schedule_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

// ============================================================================
// Balances
// ============================================================================

/// Takes a transaction-scoped advisory lock keyed on the student
///
/// Released automatically on commit or rollback.
pub async fn lock_student(conn: &mut PgConnection, school_id: Uuid, student_id: Uuid) -> Result<(), DatabaseError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || ':' || $2::text, 0))")
        .bind(school_id)
        .bind(student_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Balances on active vote heads in allocation order, row-locked
pub async fn active_balances_for_update(
    conn: &mut PgConnection,
    school_id: Uuid,
    student_id: Uuid,
) -> Result<Vec<BalanceWithVoteHeadRow>, DatabaseError> {
    let sql = format!("{BALANCE_JOIN} AND v.is_active ORDER BY v.priority, v.id FOR UPDATE OF b");
    let rows = sqlx::query_as::<_, BalanceWithVoteHeadRow>(&sql)
        .bind(school_id)
        .bind(student_id)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

pub async fn all_balances(
    conn: &mut PgConnection,
    school_id: Uuid,
    student_id: Uuid,
) -> Result<Vec<BalanceWithVoteHeadRow>, DatabaseError> {
    let sql = format!("{BALANCE_JOIN} ORDER BY v.priority, v.id");
    let rows = sqlx::query_as::<_, BalanceWithVoteHeadRow>(&sql)
        .bind(school_id)
        .bind(student_id)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

pub async fn insert_balance(conn: &mut PgConnection, row: &BalanceRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO vote_head_balances (id, student_id, vote_head_id, school_id, balance, last_updated)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(row.id)
    .bind(row.student_id)
    .bind(row.vote_head_id)
    .bind(row.school_id)
    .bind(row.balance)
    .bind(row.last_updated)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn update_balance(conn: &mut PgConnection, row: &BalanceRow) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE vote_head_balances
        SET balance = $2, last_updated = $3
        WHERE id = $1
        "#,
    )
    .bind(row.id)
    .bind(row.balance)
    .bind(row.last_updated)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("VoteHeadBalance", row.id));
    }
    Ok(())
}

pub async fn delete_balances(conn: &mut PgConnection, school_id: Uuid, student_id: Uuid) -> Result<u64, DatabaseError> {
    let result = sqlx::query("DELETE FROM vote_head_balances WHERE school_id = $1 AND student_id = $2")
        .bind(school_id)
        .bind(student_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

// ============================================================================
// Payments
// ============================================================================

pub async fn insert_payment(conn: &mut PgConnection, row: &PaymentRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payments (id, student_id, school_id, amount, payment_method, reference, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(row.id)
    .bind(row.student_id)
    .bind(row.school_id)
    .bind(row.amount)
    .bind(&row.payment_method)
    .bind(&row.reference)
    .bind(row.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn get_payment(
    conn: &mut PgConnection,
    school_id: Uuid,
    id: Uuid,
) -> Result<Option<PaymentRow>, DatabaseError> {
    let row = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT id, student_id, school_id, amount, payment_method, reference, created_at
        FROM payments
        WHERE id = $1 AND school_id = $2
        "#,
    )
    .bind(id)
    .bind(school_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Newest first; `student_id` narrows to one student
pub async fn list_payments(
    conn: &mut PgConnection,
    school_id: Uuid,
    student_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<PaymentRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT id, student_id, school_id, amount, payment_method, reference, created_at
        FROM payments
        WHERE school_id = $1 AND ($2::uuid IS NULL OR student_id = $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3
        "#,
    )
    .bind(school_id)
    .bind(student_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

pub async fn insert_allocation(conn: &mut PgConnection, row: &PaymentAllocationRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payment_allocations (
            id, payment_id, vote_head_id, amount, bal_before, bal_after, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(row.id)
    .bind(row.payment_id)
    .bind(row.vote_head_id)
    .bind(row.amount)
    .bind(row.bal_before)
    .bind(row.bal_after)
    .bind(row.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Allocation rows of a payment in the order they were applied
pub async fn allocations_for_payment(
    conn: &mut PgConnection,
    payment_id: Uuid,
) -> Result<Vec<PaymentAllocationRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, PaymentAllocationRow>(
        r#"
        SELECT a.id, a.payment_id, a.vote_head_id, a.amount, a.bal_before, a.bal_after, a.created_at
        FROM payment_allocations a
        JOIN vote_heads v ON v.id = a.vote_head_id
        WHERE a.payment_id = $1
        ORDER BY v.priority, v.id
        "#,
    )
    .bind(payment_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

// ============================================================================
// M-PESA transactions
// ============================================================================

pub async fn find_mpesa_by_trans_id(
    conn: &mut PgConnection,
    trans_id: &str,
) -> Result<Option<MpesaTransactionRow>, DatabaseError> {
    let sql = format!("SELECT {MPESA_COLUMNS} FROM mpesa_transactions WHERE trans_id = $1");
    let row = sqlx::query_as::<_, MpesaTransactionRow>(&sql)
        .bind(trans_id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Locks the row until the transaction ends
pub async fn get_mpesa_transaction(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<MpesaTransactionRow>, DatabaseError> {
    let sql = format!("SELECT {MPESA_COLUMNS} FROM mpesa_transactions WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, MpesaTransactionRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Fails with `DuplicateEntry` when `trans_id` is already stored
pub async fn insert_mpesa_transaction(
    conn: &mut PgConnection,
    row: &MpesaTransactionRow,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO mpesa_transactions (
            id, school_id, transaction_type, trans_id, trans_time, trans_amount,
            business_short_code, bill_ref_number, invoice_number, msisdn,
            first_name, middle_name, last_name, status, payment_id,
            matched_student_id, error_message, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
            $11, $12, $13, $14, $15, $16, $17, $18, $19
        )
        "#,
    )
    .bind(row.id)
    .bind(row.school_id)
    .bind(&row.transaction_type)
    .bind(&row.trans_id)
    .bind(&row.trans_time)
    .bind(row.trans_amount)
    .bind(&row.business_short_code)
    .bind(&row.bill_ref_number)
    .bind(&row.invoice_number)
    .bind(&row.msisdn)
    .bind(&row.first_name)
    .bind(&row.middle_name)
    .bind(&row.last_name)
    .bind(&row.status)
    .bind(row.payment_id)
    .bind(row.matched_student_id)
    .bind(&row.error_message)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Updates the reconciliation state; the payload columns never change
pub async fn update_mpesa_transaction(
    conn: &mut PgConnection,
    row: &MpesaTransactionRow,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE mpesa_transactions
        SET school_id = $2, status = $3, payment_id = $4,
            matched_student_id = $5, error_message = $6, updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(row.id)
    .bind(row.school_id)
    .bind(&row.status)
    .bind(row.payment_id)
    .bind(row.matched_student_id)
    .bind(&row.error_message)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("MpesaTransaction", row.id));
    }
    Ok(())
}

/// The school's transactions plus those not yet tied to any school
pub async fn list_mpesa_transactions(
    conn: &mut PgConnection,
    school_id: Uuid,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<MpesaTransactionRow>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {MPESA_COLUMNS}
        FROM mpesa_transactions
        WHERE (school_id = $1 OR school_id IS NULL)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3
        "#
    );
    let rows = sqlx::query_as::<_, MpesaTransactionRow>(&sql)
        .bind(school_id)
        .bind(status)
        .bind(limit)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}
