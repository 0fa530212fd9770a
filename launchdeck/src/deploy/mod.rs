//! Deployment lifecycle module

pub mod fsm;
pub mod pipeline;
pub mod probe;
