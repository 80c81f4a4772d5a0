//! Fee domain errors

use thiserror::Error;

use core_kernel::{
    ClassId, ExternalTransactionId, FeeCategoryId, FeeScheduleId, MoneyError, PaymentId,
    PortError, StudentId,
};

/// Errors that can occur in the fee domain
#[derive(Debug, Error)]
pub enum FeeError {
    /// Payment amount is zero or negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Student has no class, so no fee schedule applies
    #[error("Student {0} is not assigned to a class")]
    NotAssigned(StudentId),

    /// The student's class has no fee schedule
    #[error("No fee schedule found for class {0}")]
    NoSchedule(ClassId),

    /// Manual match attempted on a transaction that is already matched
    #[error("Transaction {0} is already matched")]
    AlreadyMatched(String),

    /// Student not found in the school's directory
    #[error("Student not found: {0}")]
    StudentNotFound(String),

    /// Fee category (vote head) not found
    #[error("Vote head not found: {0}")]
    CategoryNotFound(FeeCategoryId),

    /// Fee schedule not found
    #[error("Fee schedule not found: {0}")]
    ScheduleNotFound(FeeScheduleId),

    /// External transaction not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(ExternalTransactionId),

    /// Payment not found
    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// Invalid input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl FeeError {
    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        FeeError::Validation(message.into())
    }

    /// Returns true for errors that indicate a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FeeError::StudentNotFound(_)
                | FeeError::CategoryNotFound(_)
                | FeeError::ScheduleNotFound(_)
                | FeeError::TransactionNotFound(_)
                | FeeError::PaymentNotFound(_)
        )
    }
}

impl From<MoneyError> for FeeError {
    fn from(error: MoneyError) -> Self {
        match error {
            MoneyError::InvalidAmount(msg) => FeeError::InvalidAmount(msg),
            MoneyError::Overflow => FeeError::Validation("amount overflow".to_string()),
        }
    }
}
