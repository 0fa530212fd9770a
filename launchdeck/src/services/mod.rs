//! Platform state and operations

pub mod ledger;
pub mod platform;
