//! Reference deployment pipeline

use std::time::Duration;

use chrono::{DateTime, Utc};
use openapi_models::{AppSource, Deployment, DeploymentStatus, DeploymentStep, StepStatus};

use crate::utils::generate_id;

/// Step labels, in execution order
pub const STEP_NAMES: [&str; 8] = [
    "Queued",
    "Provisioning compute",
    "Configuring routing",
    "Configuring DNS",
    "Pulling image",
    "Starting container",
    "Health check",
    "Live",
];

/// Dwell time of each step before the driver advances it, in milliseconds
pub const STEP_DWELL_MS: [u64; 8] = [2000, 3000, 2000, 2000, 4000, 2000, 3000, 1000];

/// Dwell schedule as durations
pub fn default_dwell_schedule() -> Vec<Duration> {
    STEP_DWELL_MS.iter().copied().map(Duration::from_millis).collect()
}

/// A fresh step list: the first step running, the rest pending
pub fn queued_steps(now: DateTime<Utc>) -> Vec<DeploymentStep> {
    STEP_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| DeploymentStep {
            id: format!("step-{}", i + 1),
            name: name.to_string(),
            status: if i == 0 {
                StepStatus::Running
            } else {
                StepStatus::Pending
            },
            started_at: (i == 0).then_some(now),
            completed_at: None,
            error: None,
        })
        .collect()
}

/// Mint a queued deployment for an app
pub fn new_deployment(
    app_id: &str,
    version: u32,
    source: AppSource,
    now: DateTime<Utc>,
) -> Deployment {
    Deployment {
        id: generate_id("deploy"),
        app_id: app_id.to_string(),
        status: DeploymentStatus::Queued,
        version,
        source,
        steps: queued_steps(now),
        created_at: now,
        started_at: None,
        completed_at: None,
        error: None,
    }
}

/// Public URL of a live app
pub fn app_url(subdomain: &str, platform_domain: &str) -> String {
    format!("https://{}.{}", subdomain, platform_domain)
}
