//! Allocation engine
//!
//! Loads a student's active balances under lock, materializes them from the
//! fee schedule on first use, runs `distribute`, and writes the mutated
//! balances and allocation rows back in the same unit of work.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::allocation::distribute;
use crate::balance::Balance;
use crate::error::FeeError;
use crate::payment::{Payment, PaymentAllocation};
use crate::ports::{FeeStorePort, FeeUnitOfWork};
use crate::services::resolver::FeeScheduleResolver;

/// Applies payments to vote head balances in priority order
pub struct AllocationEngine {
    store: Arc<dyn FeeStorePort>,
}

impl AllocationEngine {
    pub fn new(store: Arc<dyn FeeStorePort>) -> Self {
        Self { store }
    }

    /// Allocates an already recorded payment in its own unit of work
    ///
    /// The payment's student and school scope the balances touched. Returns
    /// the allocation rows created; an overpayment credit and a dropped
    /// remainder produce none.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for a zero or negative payment, before any storage access
    /// - resolver errors when balances must be materialized
    /// - `Storage` for any persistence failure, in which case nothing is written
    #[instrument(skip(self, payment), fields(payment_id = %payment.id, student_id = %payment.student_id))]
    pub async fn allocate(&self, payment: &Payment) -> Result<Vec<PaymentAllocation>, FeeError> {
        ensure_allocatable(payment)?;

        let mut uow = self.store.begin().await?;
        let allocations = Self::allocate_in(uow.as_mut(), payment).await?;
        uow.commit().await?;
        Ok(allocations)
    }

    /// Allocates inside the caller's unit of work
    pub async fn allocate_in(
        uow: &mut dyn FeeUnitOfWork,
        payment: &Payment,
    ) -> Result<Vec<PaymentAllocation>, FeeError> {
        ensure_allocatable(payment)?;
        let (school_id, student_id) = (payment.school_id, payment.student_id);

        uow.lock_student(school_id, student_id).await?;
        let mut balances = uow.active_balances_for_update(school_id, student_id).await?;
        if balances.is_empty() {
            FeeScheduleResolver::resolve_missing_in(uow, student_id, school_id).await?;
            balances = uow.active_balances_for_update(school_id, student_id).await?;
        }

        let plan = distribute(payment.id, payment.amount, &mut balances, Utc::now());

        if plan.dropped.is_positive() {
            warn!(
                payment_id = %payment.id,
                dropped = %plan.dropped,
                "No balances to carry overpayment; remainder not recorded"
            );
        }

        let changed: Vec<Balance> = plan
            .touched
            .iter()
            .map(|&index| balances[index].balance.clone())
            .collect();
        uow.update_balances(&changed).await?;
        uow.insert_allocations(&plan.allocations).await?;

        info!(
            payment_id = %payment.id,
            amount = %payment.amount,
            allocated = %plan.allocated(),
            credit = %plan.credit,
            vote_heads = plan.allocations.len(),
            "Payment allocated"
        );
        Ok(plan.allocations)
    }
}

fn ensure_allocatable(payment: &Payment) -> Result<(), FeeError> {
    if payment.amount.is_positive() {
        Ok(())
    } else {
        Err(FeeError::InvalidAmount(format!(
            "payment amount must be positive, got {}",
            payment.amount
        )))
    }
}
