//! Payment ledger
//!
//! Payments are append-only records of money received. Each payment is linked
//! to zero or more allocation rows, one per vote head it cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AllocationId, FeeCategoryId, Money, PaymentId, SchoolId, StudentId};

/// How the money was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash at the bursar's office
    Cash,
    /// Bank deposit or transfer
    Bank,
    /// M-PESA mobile money
    Mpesa,
}

impl PaymentMethod {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Bank => "BANK",
            PaymentMethod::Mpesa => "MPESA",
        }
    }

    /// Parses the stored representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CASH" => Some(PaymentMethod::Cash),
            "BANK" => Some(PaymentMethod::Bank),
            "MPESA" => Some(PaymentMethod::Mpesa),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub amount: Money,
    pub method: PaymentMethod,
    /// Bank slip number, receipt number, or M-PESA transaction id
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a payment from a request, stamping it now
    pub fn from_request(request: NewPayment) -> Self {
        Self {
            id: PaymentId::new_v7(),
            student_id: request.student_id,
            school_id: request.school_id,
            amount: request.amount,
            method: request.method,
            reference: request.reference,
            created_at: Utc::now(),
        }
    }

    /// Creates an M-PESA payment referencing the network's transaction id
    pub fn mpesa(
        student_id: StudentId,
        school_id: SchoolId,
        amount: Money,
        trans_id: impl Into<String>,
    ) -> Self {
        Self::from_request(NewPayment {
            student_id,
            school_id,
            amount,
            method: PaymentMethod::Mpesa,
            reference: Some(trans_id.into()),
        })
    }
}

/// Input for recording a payment directly (cash or bank)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

/// Audit row recording part of a payment applied to one vote head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub id: AllocationId,
    pub payment_id: PaymentId,
    #[serde(rename = "vote_head_id")]
    pub category_id: FeeCategoryId,
    pub amount: Money,
    /// Vote head balance immediately before this application
    pub bal_before: Money,
    /// Vote head balance immediately after this application
    pub bal_after: Money,
    pub created_at: DateTime<Utc>,
}

impl PaymentAllocation {
    pub fn new(
        payment_id: PaymentId,
        category_id: FeeCategoryId,
        amount: Money,
        bal_before: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AllocationId::new_v7(),
            payment_id,
            category_id,
            amount,
            bal_before,
            bal_after: bal_before - amount,
            created_at: now,
        }
    }
}

/// A payment with the allocations it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub payment: Payment,
    pub allocations: Vec<PaymentAllocation>,
    /// Sum of the allocation amounts
    pub allocated: Money,
}

impl Receipt {
    pub fn new(payment: Payment, allocations: Vec<PaymentAllocation>) -> Self {
        let allocated = allocations.iter().map(|a| a.amount).sum();
        Self {
            payment,
            allocations,
            allocated,
        }
    }

    /// Part of the payment not covered by allocation rows (credit or dropped)
    pub fn unallocated(&self) -> Money {
        self.payment.amount - self.allocated
    }
}
