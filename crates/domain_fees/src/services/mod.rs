//! Fee domain services
//!
//! Services orchestrate the entities and the pure allocation algorithm over a
//! `FeeStorePort`. Each public call opens exactly one unit of work at a time.

pub mod admin;
pub mod balances;
pub mod engine;
pub mod payments;
pub mod reconciler;
pub mod resolver;

pub use admin::{CategoryUpdate, FeeAdministration};
pub use balances::BalanceService;
pub use engine::AllocationEngine;
pub use payments::PaymentService;
pub use reconciler::PaymentReconciler;
pub use resolver::FeeScheduleResolver;

/// Cap on rows returned by review and listing queries
pub const LIST_LIMIT: i64 = 100;
