//! Fee Domain - Priority-Ordered Vote Head Allocation
//!
//! Schools split their fees into vote heads (tuition, repairs and maintenance,
//! activity, ...). Each student carries one running balance per vote head,
//! and every payment received clears those balances strictly in priority
//! order, leaving an auditable allocation row for each vote head it touched.
//!
//! # Flow
//!
//! ```text
//! cash/bank ──► PaymentService::record_payment ─┐
//!                                               ├─► AllocationEngine ──► balances + allocations
//! M-PESA ─────► PaymentReconciler::ingest ──────┘          │
//!                                                          └─► FeeScheduleResolver (first payment)
//! ```
//!
//! - Partial payments clear the highest-priority vote heads first.
//! - Overpayments leave the lowest-priority vote head negative (credit).
//! - M-PESA confirmations are stored once per network transaction id.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_fees::{PaymentService, NewPayment, PaymentMethod};
//!
//! let service = PaymentService::new(store.clone());
//! let receipt = service.record_payment(NewPayment {
//!     student_id,
//!     school_id,
//!     amount: Money::new(dec!(7000)),
//!     method: PaymentMethod::Cash,
//!     reference: None,
//! }).await?;
//! ```

pub mod allocation;
pub mod balance;
pub mod category;
pub mod error;
pub mod external;
pub mod payment;
pub mod ports;
pub mod schedule;
pub mod services;
pub mod student;

pub use allocation::{distribute, AllocationPlan};
pub use balance::{Balance, Breakdown, CategoryBalance, PrioritizedBalance};
pub use category::FeeCategory;
pub use error::FeeError;
pub use external::{Ack, C2bNotification, ExternalTransaction, TransactionStatus};
pub use payment::{NewPayment, Payment, PaymentAllocation, PaymentMethod, Receipt};
pub use ports::{FeeStorePort, FeeUnitOfWork};
pub use schedule::{FeeSchedule, FeeScheduleItem};
pub use services::{
    AllocationEngine, BalanceService, CategoryUpdate, FeeAdministration, FeeScheduleResolver,
    PaymentReconciler, PaymentService,
};
pub use student::Student;
