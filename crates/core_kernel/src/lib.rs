//! Core Kernel - Foundational types and utilities for the school fees system
//!
//! This crate provides the fundamental building blocks used across all modules:
//! - Money type with precise decimal arithmetic (single currency)
//! - Strongly-typed identifiers for schools, students, and fee entities
//! - Port infrastructure shared by domain ports and their adapters

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{Money, MoneyError, CURRENCY_CODE};
pub use identifiers::{
    SchoolId, StudentId, ClassId, FeeCategoryId, FeeScheduleId, FeeScheduleItemId,
    BalanceId, PaymentId, AllocationId, ExternalTransactionId,
};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
