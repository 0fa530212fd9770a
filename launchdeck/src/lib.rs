//! Launchdeck
//!
//! Deployment lifecycle core of an app hosting platform: the deployment state
//! machine and the ledger it runs against, a timer-driven deployment driver,
//! the REST API serving it, a polling client that observes it and the
//! persisted deployment wizard that feeds it.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
pub mod wizard;
pub mod workers;
