//! Request handlers, one module per resource

pub mod finance;
pub mod health;
pub mod mpesa;
pub mod schedules;
pub mod vote_heads;
