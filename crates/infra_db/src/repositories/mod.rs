//! Repository implementations
//!
//! Repositories own the SQL. They speak in row types and raw UUIDs; mapping
//! to domain types happens in the adapters.

pub mod fees;
