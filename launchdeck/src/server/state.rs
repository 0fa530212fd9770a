//! Server state

use std::sync::Arc;

use crate::services::platform::PlatformService;

/// Server state shared across handlers
pub struct ServerState {
    pub platform: Arc<PlatformService>,
}

impl ServerState {
    pub fn new(platform: Arc<PlatformService>) -> Self {
        Self { platform }
    }
}
