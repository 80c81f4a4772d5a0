//! Request and response bodies

pub mod finance;
pub mod mpesa;
pub mod schedules;
pub mod vote_heads;
