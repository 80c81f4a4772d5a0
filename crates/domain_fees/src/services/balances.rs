//! Balance breakdown and re-initialization

use std::sync::Arc;

use tracing::{info, instrument};

use core_kernel::{SchoolId, StudentId};

use crate::balance::Breakdown;
use crate::error::FeeError;
use crate::ports::FeeStorePort;
use crate::services::resolver::FeeScheduleResolver;

/// Read and reset a student's vote head balances
pub struct BalanceService {
    store: Arc<dyn FeeStorePort>,
}

impl BalanceService {
    pub fn new(store: Arc<dyn FeeStorePort>) -> Self {
        Self { store }
    }

    /// Every balance of the student, inactive vote heads included, ordered by
    /// priority, with their sum
    pub async fn breakdown(&self, student_id: StudentId, school_id: SchoolId) -> Result<Breakdown, FeeError> {
        let mut uow = self.store.begin().await?;
        let balances = uow.all_balances(school_id, student_id).await?;
        Ok(Breakdown::from_balances(student_id, balances))
    }

    /// Wipes the student's balances and regenerates them from the fee schedule
    ///
    /// Runs in one unit of work: if the schedule cannot be resolved the old
    /// balances are kept.
    #[instrument(skip(self), fields(student_id = %student_id, school_id = %school_id))]
    pub async fn reinitialize(&self, student_id: StudentId, school_id: SchoolId) -> Result<Breakdown, FeeError> {
        let mut uow = self.store.begin().await?;
        uow.lock_student(school_id, student_id).await?;

        let removed = uow.delete_balances(school_id, student_id).await?;
        FeeScheduleResolver::resolve_in(uow.as_mut(), student_id, school_id).await?;
        let balances = uow.all_balances(school_id, student_id).await?;
        uow.commit().await?;

        info!(removed, created = balances.len(), "Balances re-initialized");
        Ok(Breakdown::from_balances(student_id, balances))
    }
}
