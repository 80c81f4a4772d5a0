//! M-PESA C2B reconciliation
//!
//! `ingest` handles the confirmation callback: it stores the transaction once
//! per network id, matches the account reference to a student, records the
//! payment and then allocates it. The network has no way to handle a rejected
//! confirmation, so `ingest` never fails; every outcome becomes an `Ack`.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use core_kernel::{ExternalTransactionId, Money, SchoolId, StudentId};

use crate::error::FeeError;
use crate::external::{Ack, C2bNotification, ExternalTransaction, TransactionStatus};
use crate::payment::Payment;
use crate::ports::{FeeStorePort, FeeUnitOfWork};
use crate::services::engine::AllocationEngine;
use crate::services::LIST_LIMIT;
use crate::student::{normalize_reference, Student};

const NOT_FOUND_MESSAGE: &str = "Student not found by admission number";
const AMBIGUOUS_MESSAGE: &str = "Admission number matches more than one student";
const PAYMENT_FAILED_MESSAGE: &str = "Failed to create payment record";

/// Outcome of looking up the payer's account reference
enum Lookup {
    Found(Student),
    Unmatched(&'static str),
}

/// Matches mobile-money transactions to students and payments
pub struct PaymentReconciler {
    store: Arc<dyn FeeStorePort>,
    engine: AllocationEngine,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn FeeStorePort>) -> Self {
        Self {
            engine: AllocationEngine::new(store.clone()),
            store,
        }
    }

    /// Pre-capture check: accepts only references that resolve to a student
    ///
    /// Writes nothing.
    #[instrument(skip(self, notification), fields(trans_id = %notification.trans_id))]
    pub async fn validate(&self, notification: &C2bNotification) -> Ack {
        match self.lookup(&notification.bill_ref_number).await {
            Ok(Lookup::Found(_)) => Ack::accepted(),
            Ok(Lookup::Unmatched(_)) => {
                Ack::rejected_unknown_reference(normalize_reference(&notification.bill_ref_number))
            }
            Err(e) => {
                error!(error = %e, "Validation lookup failed");
                Ack::validation_unavailable()
            }
        }
    }

    async fn lookup(&self, reference: &str) -> Result<Lookup, FeeError> {
        let mut uow = self.store.begin().await?;
        lookup_student(uow.as_mut(), reference).await
    }

    /// Post-capture confirmation; idempotent on the network transaction id
    #[instrument(skip(self, notification), fields(trans_id = %notification.trans_id, amount = %notification.trans_amount))]
    pub async fn ingest(&self, notification: &C2bNotification) -> Ack {
        match self.try_ingest(notification).await {
            Ok(ack) => ack,
            Err(e) => {
                error!(error = %e, "Confirmation could not be stored");
                Ack::error_logged()
            }
        }
    }

    async fn try_ingest(&self, notification: &C2bNotification) -> Result<Ack, FeeError> {
        let mut uow = self.store.begin().await?;
        if uow
            .find_external_by_trans_id(&notification.trans_id)
            .await?
            .is_some()
        {
            info!("Transaction already processed");
            return Ok(Ack::already_processed());
        }

        let mut transaction = ExternalTransaction::from_notification(notification);
        let student = match lookup_student(uow.as_mut(), &notification.bill_ref_number).await? {
            Lookup::Found(student) => student,
            Lookup::Unmatched(reason) => {
                warn!(bill_ref = %notification.bill_ref_number, reason, "Transaction unmatched");
                transaction.mark_unmatched(reason);
                return self.store_final(uow, &transaction, Ack::logged_for_manual_matching()).await;
            }
        };

        let amount = Money::new(notification.trans_amount);
        if !amount.is_positive() {
            warn!("Non-positive confirmation amount");
            transaction.mark_failed(Some(student.school_id), format!("Invalid amount: {}", amount));
            return self.store_final(uow, &transaction, Ack::error_logged()).await;
        }

        let payment = Payment::mpesa(student.id, student.school_id, amount, &notification.trans_id);
        if let Err(e) = uow.insert_payment(&payment).await {
            error!(error = %e, student_id = %student.id, "Payment record could not be created");
            drop(uow);
            transaction.mark_failed(Some(student.school_id), PAYMENT_FAILED_MESSAGE);
            let uow = self.store.begin().await?;
            return self.store_final(uow, &transaction, Ack::error_logged()).await;
        }

        transaction.mark_matched(student.school_id, student.id, payment.id);
        if let Some(ack) = insert_once(uow.as_mut(), &transaction).await? {
            return Ok(ack);
        }
        uow.commit().await?;
        info!(payment_id = %payment.id, student_id = %student.id, "Transaction matched");

        // The payment is durable from here on; allocation failures are left
        // for an operator to retry
        match self.engine.allocate(&payment).await {
            Ok(allocations) => {
                info!(payment_id = %payment.id, vote_heads = allocations.len(), "Allocated to vote heads")
            }
            Err(e) => error!(payment_id = %payment.id, error = %e, "Vote head allocation failed"),
        }

        Ok(Ack::success())
    }

    /// Inserts a transaction in a terminal state and commits
    async fn store_final(
        &self,
        mut uow: Box<dyn FeeUnitOfWork>,
        transaction: &ExternalTransaction,
        ack: Ack,
    ) -> Result<Ack, FeeError> {
        if let Some(duplicate) = insert_once(uow.as_mut(), transaction).await? {
            return Ok(duplicate);
        }
        uow.commit().await?;
        Ok(ack)
    }

    /// Matches a transaction to a student by hand
    ///
    /// Creates the payment and marks the transaction matched in one unit of
    /// work, then allocates it the same way a confirmation does: an
    /// allocation failure is logged and the match stands. The transaction
    /// must belong to the school or not yet be assigned to any school.
    #[instrument(skip(self), fields(transaction_id = %transaction_id, school_id = %school_id, student_id = %student_id))]
    pub async fn manual_match(
        &self,
        transaction_id: ExternalTransactionId,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Payment, FeeError> {
        let mut uow = self.store.begin().await?;
        let mut transaction = uow
            .get_external(transaction_id)
            .await?
            .filter(|t| t.school_id.map_or(true, |owner| owner == school_id))
            .ok_or(FeeError::TransactionNotFound(transaction_id))?;
        if !transaction.status.is_matchable() {
            return Err(FeeError::AlreadyMatched(transaction.trans_id));
        }

        let student = uow
            .find_student(school_id, student_id)
            .await?
            .ok_or_else(|| FeeError::StudentNotFound(student_id.to_string()))?;
        let amount = transaction.trans_amount.ensure_positive()?;

        let payment = Payment::mpesa(student.id, school_id, amount, transaction.trans_id.clone());
        uow.insert_payment(&payment).await?;
        transaction.mark_matched(school_id, student.id, payment.id);
        uow.update_external(&transaction).await?;
        uow.commit().await?;
        info!(payment_id = %payment.id, "Transaction matched manually");

        match self.engine.allocate(&payment).await {
            Ok(allocations) => {
                info!(payment_id = %payment.id, vote_heads = allocations.len(), "Allocated to vote heads")
            }
            Err(e) => error!(payment_id = %payment.id, error = %e, "Vote head allocation failed"),
        }
        Ok(payment)
    }

    /// Review queue: the school's transactions plus unassigned ones, newest
    /// first
    pub async fn list_transactions(
        &self,
        school_id: SchoolId,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<ExternalTransaction>, FeeError> {
        let mut uow = self.store.begin().await?;
        Ok(uow.list_external(school_id, status, LIST_LIMIT).await?)
    }
}

async fn lookup_student(uow: &mut dyn FeeUnitOfWork, reference: &str) -> Result<Lookup, FeeError> {
    let mut students = uow
        .find_students_by_enrollment(normalize_reference(reference))
        .await?;
    Ok(match students.len() {
        0 => Lookup::Unmatched(NOT_FOUND_MESSAGE),
        1 => Lookup::Found(students.remove(0)),
        _ => Lookup::Unmatched(AMBIGUOUS_MESSAGE),
    })
}

/// Inserts the transaction, turning a lost uniqueness race into the
/// "already processed" acknowledgment
async fn insert_once(
    uow: &mut dyn FeeUnitOfWork,
    transaction: &ExternalTransaction,
) -> Result<Option<Ack>, FeeError> {
    match uow.insert_external(transaction).await {
        Ok(()) => Ok(None),
        Err(e) if e.is_conflict() => {
            info!(trans_id = %transaction.trans_id, "Concurrent duplicate confirmation");
            Ok(Some(Ack::already_processed()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::MockFeeStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn notification(trans_id: &str, reference: &str, amount: Decimal) -> C2bNotification {
        C2bNotification {
            transaction_type: "Pay Bill".to_string(),
            trans_id: trans_id.to_string(),
            trans_time: "20240115143012".to_string(),
            trans_amount: amount,
            business_short_code: "600638".to_string(),
            bill_ref_number: reference.to_string(),
            invoice_number: String::new(),
            msisdn: "254708374149".to_string(),
            first_name: "Jane".to_string(),
            middle_name: String::new(),
            last_name: "Wanjiru".to_string(),
        }
    }

    #[tokio::test]
    async fn test_validate_writes_nothing() {
        let store = MockFeeStore::new();
        let student = Student::new(SchoolId::new(), "ADM-001", None);
        store.add_student(student).await;
        let reconciler = PaymentReconciler::new(Arc::new(store.clone()));

        let ack = reconciler.validate(&notification("X1", " ADM-001", dec!(100))).await;
        assert!(ack.is_accepted());
        assert_eq!(ack.result_desc, "Accepted");

        let ack = reconciler.validate(&notification("X1", "ADM-999", dec!(100))).await;
        assert_eq!(ack.result_code, 1);
        assert!(ack.result_desc.contains("ADM-999"));

        assert!(store.external_transactions().await.is_empty());
        assert!(store.payments().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_reference_is_unmatched() {
        let store = MockFeeStore::new();
        let reconciler = PaymentReconciler::new(Arc::new(store.clone()));

        let ack = reconciler.ingest(&notification("X2", "ADM-404", dec!(500))).await;
        assert_eq!(ack, Ack::logged_for_manual_matching());

        let stored = store.external_transactions().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, TransactionStatus::Unmatched);
        assert!(stored[0].school_id.is_none());
        assert_eq!(stored[0].error_message.as_deref(), Some(NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn test_ambiguous_reference_is_unmatched() {
        let store = MockFeeStore::new();
        store.add_student(Student::new(SchoolId::new(), "ADM-001", None)).await;
        store.add_student(Student::new(SchoolId::new(), "ADM-001", None)).await;
        let reconciler = PaymentReconciler::new(Arc::new(store.clone()));

        let ack = reconciler.ingest(&notification("X3", "ADM-001", dec!(500))).await;
        assert_eq!(ack, Ack::logged_for_manual_matching());
        assert!(store.payments().await.is_empty());
    }

    #[tokio::test]
    async fn test_payment_failure_is_recorded_as_failed() {
        let store = MockFeeStore::new();
        let student = Student::new(SchoolId::new(), "ADM-001", None);
        store.add_student(student.clone()).await;
        store.fail_payment_inserts(true);
        let reconciler = PaymentReconciler::new(Arc::new(store.clone()));

        let ack = reconciler.ingest(&notification("X4", "ADM-001", dec!(500))).await;
        assert_eq!(ack, Ack::error_logged());
        assert!(ack.is_accepted());

        let stored = store.external_transactions().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, TransactionStatus::Failed);
        assert_eq!(stored[0].school_id, Some(student.school_id));
        assert!(store.payments().await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_amount_is_recorded_as_failed() {
        let store = MockFeeStore::new();
        store.add_student(Student::new(SchoolId::new(), "ADM-001", None)).await;
        let reconciler = PaymentReconciler::new(Arc::new(store.clone()));

        let ack = reconciler.ingest(&notification("X5", "ADM-001", dec!(0))).await;
        assert_eq!(ack, Ack::error_logged());
        let stored = store.external_transactions().await;
        assert_eq!(stored[0].status, TransactionStatus::Failed);
        assert!(store.payments().await.is_empty());
    }

    #[tokio::test]
    async fn test_allocation_failure_still_matches() {
        let store = MockFeeStore::new();
        // No class: allocation fails with NotAssigned
        let student = Student::new(SchoolId::new(), "ADM-001", None);
        store.add_student(student.clone()).await;
        let reconciler = PaymentReconciler::new(Arc::new(store.clone()));

        let ack = reconciler.ingest(&notification("X6", "ADM-001", dec!(500))).await;
        assert_eq!(ack, Ack::success());

        let stored = store.external_transactions().await;
        assert_eq!(stored[0].status, TransactionStatus::Matched);
        assert_eq!(stored[0].matched_student_id, Some(student.id));
        assert_eq!(store.payments().await.len(), 1);
        assert!(store.allocations().await.is_empty());
    }

    #[tokio::test]
    async fn test_manual_match_rules() {
        let store = MockFeeStore::new();
        let school = SchoolId::new();
        let reconciler = PaymentReconciler::new(Arc::new(store.clone()));
        reconciler.ingest(&notification("X7", "typo", dec!(500))).await;
        let transaction = store.external_transactions().await.remove(0);

        // Student must be in the matching school
        let outsider = Student::new(SchoolId::new(), "ADM-100", None);
        store.add_student(outsider.clone()).await;
        let err = reconciler
            .manual_match(transaction.id, school, outsider.id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = reconciler
            .manual_match(ExternalTransactionId::new(), school, outsider.id)
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::TransactionNotFound(_)));
    }
}
