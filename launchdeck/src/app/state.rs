//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::probe::{AlwaysPass, StepProbe};
use crate::services::ledger::Ledger;
use crate::services::platform::PlatformService;
use crate::workers::simulator::{self, Simulator};

/// Main application state
pub struct AppState {
    pub ledger: Arc<Ledger>,

    /// Drives in-flight deployments
    pub simulator: Arc<Simulator>,

    /// Operations exposed over HTTP
    pub platform: Arc<PlatformService>,
}

impl AppState {
    /// Initialize application state with steps that always pass
    pub fn init(options: &AppOptions) -> Self {
        Self::with_probe(options, Arc::new(AlwaysPass))
    }

    pub fn with_probe(options: &AppOptions, probe: Arc<dyn StepProbe>) -> Self {
        info!(
            "Initializing application state for *.{}",
            options.platform_domain
        );

        let ledger = Arc::new(Ledger::new(options.platform_domain.clone()));
        let simulator = Arc::new(Simulator::new(
            ledger.clone(),
            simulator::Options {
                schedule: options.step_dwell.clone(),
                probe,
            },
        ));
        let platform = Arc::new(PlatformService::new(
            ledger.clone(),
            simulator.clone(),
            options.logs_page_size,
        ));

        Self {
            ledger,
            simulator,
            platform,
        }
    }

    /// Stop every deployment driver
    pub fn shutdown(&self) {
        self.platform.shutdown();
    }
}
