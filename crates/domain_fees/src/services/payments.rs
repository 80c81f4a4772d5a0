//! Direct payment recording and the payment ledger queries

use std::sync::Arc;

use tracing::{info, instrument};

use core_kernel::{PaymentId, SchoolId, StudentId};

use crate::error::FeeError;
use crate::payment::{NewPayment, Payment, Receipt};
use crate::ports::FeeStorePort;
use crate::services::engine::AllocationEngine;
use crate::services::LIST_LIMIT;

/// Records cash and bank payments and serves the payment ledger
pub struct PaymentService {
    store: Arc<dyn FeeStorePort>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn FeeStorePort>) -> Self {
        Self { store }
    }

    /// Records a payment and allocates it
    ///
    /// The payment row, the balance updates and the allocation rows commit
    /// together. Any failure, allocation included, is returned to the caller
    /// and nothing is persisted.
    #[instrument(skip(self, request), fields(student_id = %request.student_id, school_id = %request.school_id))]
    pub async fn record_payment(&self, request: NewPayment) -> Result<Receipt, FeeError> {
        request.amount.ensure_positive()?;

        let mut uow = self.store.begin().await?;
        uow.find_student(request.school_id, request.student_id)
            .await?
            .ok_or_else(|| FeeError::StudentNotFound(request.student_id.to_string()))?;

        let payment = Payment::from_request(request);
        uow.insert_payment(&payment).await?;
        let allocations = AllocationEngine::allocate_in(uow.as_mut(), &payment).await?;
        uow.commit().await?;

        info!(
            payment_id = %payment.id,
            method = %payment.method,
            amount = %payment.amount,
            "Payment recorded"
        );
        Ok(Receipt::new(payment, allocations))
    }

    /// A payment with its allocation rows
    pub async fn receipt(&self, school_id: SchoolId, payment_id: PaymentId) -> Result<Receipt, FeeError> {
        let mut uow = self.store.begin().await?;
        let payment = uow
            .get_payment(school_id, payment_id)
            .await?
            .ok_or(FeeError::PaymentNotFound(payment_id))?;
        let allocations = uow.allocations_for_payment(payment_id).await?;
        Ok(Receipt::new(payment, allocations))
    }

    /// Payments of a school, optionally of one student, newest first
    pub async fn list_payments(
        &self,
        school_id: SchoolId,
        student_id: Option<StudentId>,
    ) -> Result<Vec<Payment>, FeeError> {
        let mut uow = self.store.begin().await?;
        Ok(uow.list_payments(school_id, student_id, LIST_LIMIT).await?)
    }
}
