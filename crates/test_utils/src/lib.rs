//! Test Utilities Crate
//!
//! Shared test infrastructure for the school fee workspace.
//!
//! # Modules
//!
//! - `fixtures`: Deterministic ids, amounts and M-PESA payloads
//! - `builders`: Builders for students, vote heads, schedules and notifications
//! - `database`: PostgreSQL test container with the schema applied
//! - `assertions`: Assertion helpers for allocations and receipts
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
