//! PostgreSQL store integration tests
//!
//! These start a PostgreSQL container and run the fee services against
//! `PostgresFeeStore`. Each test works in its own school so they can share
//! one container.

use std::sync::Arc;

use core_kernel::{AdapterHealth, ClassId, HealthCheckable, Money, SchoolId};
use domain_fees::{
    Ack, BalanceService, FeeAdministration, FeeStorePort, PaymentReconciler, PaymentService,
    Student, TransactionStatus,
};
use infra_db::PostgresFeeStore;
use rust_decimal_macros::dec;
use test_utils::{
    assert_fully_allocated, assert_priority_order, get_shared_test_database, MpesaFixtures,
    TestPaymentBuilder, TestStudentBuilder,
};
use uuid::Uuid;

struct Tenant {
    store: Arc<PostgresFeeStore>,
    school_id: SchoolId,
    class_id: ClassId,
}

impl Tenant {
    /// A school with Tuition 5000, R&MI 3000 and Activity 2000 scheduled for
    /// one class
    async fn with_schedule() -> Self {
        let db = get_shared_test_database().await;
        let store = Arc::new(PostgresFeeStore::new(db.pool().clone()));
        let school_id = SchoolId::new_v7();
        let class_id = ClassId::new_v7();

        let admin = FeeAdministration::new(store.clone());
        let schedule = admin
            .create_schedule(school_id, class_id, Money::new(dec!(10000)), "2024-T1")
            .await
            .unwrap();
        for (name, amount) in [("Tuition", dec!(5000)), ("R&MI", dec!(3000)), ("Activity", dec!(2000))] {
            let category = admin.create_category(school_id, name, None).await.unwrap();
            admin
                .add_schedule_item(school_id, schedule.id, category.id, Money::new(amount))
                .await
                .unwrap();
        }

        Self {
            store,
            school_id,
            class_id,
        }
    }

    async fn student(&self) -> Student {
        let student = TestStudentBuilder::new()
            .with_school(self.school_id)
            .with_class(self.class_id)
            .with_enrollment_number(format!("ADM-{}", Uuid::now_v7().simple()))
            .build();
        self.store.register_student(&student).await.unwrap();
        student
    }
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_first_payment_materializes_and_allocates() {
    let tenant = Tenant::with_schedule().await;
    let student = tenant.student().await;
    let payments = PaymentService::new(tenant.store.clone());

    let receipt = payments
        .record_payment(
            TestPaymentBuilder::for_student(&student)
                .with_amount(Money::new(dec!(7000)))
                .build(),
        )
        .await
        .unwrap();
    assert_fully_allocated(&receipt);
    assert_eq!(receipt.allocations.len(), 2);

    let breakdown = BalanceService::new(tenant.store.clone())
        .breakdown(student.id, tenant.school_id)
        .await
        .unwrap();
    assert_priority_order(&breakdown.breakdown);
    let amounts: Vec<_> = breakdown.breakdown.iter().map(|b| b.balance.amount()).collect();
    assert_eq!(amounts, vec![dec!(0), dec!(1000), dec!(2000)]);
    assert_eq!(breakdown.total_balance, Money::new(dec!(3000)));

    let stored = payments.receipt(tenant.school_id, receipt.payment.id).await.unwrap();
    assert_eq!(stored.allocations.len(), 2);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_concurrent_payments_never_double_spend() {
    let tenant = Tenant::with_schedule().await;
    let student = tenant.student().await;
    let payments = Arc::new(PaymentService::new(tenant.store.clone()));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let payments = payments.clone();
        let request = TestPaymentBuilder::for_student(&student)
            .with_amount(Money::new(dec!(1000)))
            .build();
        handles.push(tokio::spawn(async move { payments.record_payment(request).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let breakdown = BalanceService::new(tenant.store.clone())
        .breakdown(student.id, tenant.school_id)
        .await
        .unwrap();
    assert_eq!(breakdown.breakdown.len(), 3);
    assert_eq!(breakdown.total_balance, Money::new(dec!(5000)));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_duplicate_confirmation_is_processed_once() {
    let tenant = Tenant::with_schedule().await;
    let student = tenant.student().await;
    let reconciler = PaymentReconciler::new(tenant.store.clone());
    let trans_id = format!("X{}", &Uuid::now_v7().simple().to_string()[..9]).to_uppercase();
    let notification = MpesaFixtures::confirmation(&trans_id, &student.enrollment_number, dec!(4000));

    assert_eq!(reconciler.ingest(&notification).await, Ack::success());
    assert_eq!(reconciler.ingest(&notification).await, Ack::already_processed());

    let matched = reconciler
        .list_transactions(tenant.school_id, Some(TransactionStatus::Matched))
        .await
        .unwrap();
    let ours: Vec<_> = matched.iter().filter(|t| t.trans_id == trans_id).collect();
    assert_eq!(ours.len(), 1);
    assert_eq!(ours[0].matched_student_id, Some(student.id));

    let payments = PaymentService::new(tenant.store.clone())
        .list_payments(tenant.school_id, Some(student.id))
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);

    let db = get_shared_test_database().await;
    let rows = db
        .count_where("mpesa_transactions", "trans_id", &trans_id)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_unmatched_then_manual_match() {
    let tenant = Tenant::with_schedule().await;
    let student = tenant.student().await;
    let reconciler = PaymentReconciler::new(tenant.store.clone());
    let trans_id = format!("U{}", &Uuid::now_v7().simple().to_string()[..9]).to_uppercase();
    let notification = MpesaFixtures::confirmation(&trans_id, "NOBODY-HERE", dec!(2500));

    assert_eq!(reconciler.ingest(&notification).await, Ack::logged_for_manual_matching());

    let parked = reconciler
        .list_transactions(tenant.school_id, Some(TransactionStatus::Unmatched))
        .await
        .unwrap();
    let transaction = parked
        .into_iter()
        .find(|t| t.trans_id == trans_id)
        .expect("unmatched transaction visible to every school");
    assert!(transaction.school_id.is_none());

    let payment = reconciler
        .manual_match(transaction.id, tenant.school_id, student.id)
        .await
        .unwrap();
    assert_eq!(payment.amount, Money::new(dec!(2500)));

    let err = reconciler
        .manual_match(transaction.id, tenant.school_id, student.id)
        .await
        .unwrap_err();
    assert!(matches!(err, domain_fees::FeeError::AlreadyMatched(_)));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_duplicate_trans_id_insert_conflicts() {
    let db = get_shared_test_database().await;
    let store = PostgresFeeStore::new(db.pool().clone());
    let trans_id = format!("D{}", &Uuid::now_v7().simple().to_string()[..9]).to_uppercase();
    let notification = MpesaFixtures::confirmation(&trans_id, "ADM-001", dec!(100));
    let transaction = domain_fees::ExternalTransaction::from_notification(&notification);

    let mut uow = store.begin().await.unwrap();
    uow.insert_external(&transaction).await.unwrap();
    uow.commit().await.unwrap();

    let mut copy = domain_fees::ExternalTransaction::from_notification(&notification);
    copy.trans_amount = Money::new(dec!(999));
    let mut uow = store.begin().await.unwrap();
    let err = uow.insert_external(&copy).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_health_check() {
    let db = get_shared_test_database().await;
    let store = PostgresFeeStore::new(db.pool().clone());
    let health = store.health_check().await;
    assert_eq!(health.status, AdapterHealth::Healthy);
    assert_eq!(health.adapter_id, "postgres-fee-store");
}
