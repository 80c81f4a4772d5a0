//! Payment and balance DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_fees::{Breakdown, CategoryBalance, Payment, PaymentAllocation, PaymentMethod, Receipt};

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub student_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 255))]
    pub reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentsQuery {
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.into(),
            student_id: payment.student_id.into(),
            amount: payment.amount.amount(),
            payment_method: payment.method,
            reference: payment.reference,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AllocationResponse {
    pub vote_head_id: Uuid,
    pub amount: Decimal,
    pub bal_before: Decimal,
    pub bal_after: Decimal,
}

impl From<PaymentAllocation> for AllocationResponse {
    fn from(allocation: PaymentAllocation) -> Self {
        Self {
            vote_head_id: allocation.category_id.into(),
            amount: allocation.amount.amount(),
            bal_before: allocation.bal_before.amount(),
            bal_after: allocation.bal_after.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub payment: PaymentResponse,
    pub allocations: Vec<AllocationResponse>,
    pub allocated: Decimal,
}

impl From<Receipt> for ReceiptResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            allocated: receipt.allocated.amount(),
            payment: receipt.payment.into(),
            allocations: receipt.allocations.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoteHeadBalanceResponse {
    pub vote_head_id: Uuid,
    pub vote_head_name: String,
    pub priority: i32,
    pub balance: Decimal,
}

impl From<CategoryBalance> for VoteHeadBalanceResponse {
    fn from(balance: CategoryBalance) -> Self {
        Self {
            vote_head_id: balance.category_id.into(),
            vote_head_name: balance.category_name,
            priority: balance.priority,
            balance: balance.balance.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceBreakdownResponse {
    pub student_id: Uuid,
    pub breakdown: Vec<VoteHeadBalanceResponse>,
    pub total_balance: Decimal,
}

impl From<Breakdown> for BalanceBreakdownResponse {
    fn from(breakdown: Breakdown) -> Self {
        Self {
            student_id: breakdown.student_id.into(),
            breakdown: breakdown.breakdown.into_iter().map(Into::into).collect(),
            total_balance: breakdown.total_balance.amount(),
        }
    }
}
