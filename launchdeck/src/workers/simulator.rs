//! Deployment driver
//!
//! Each in-flight deployment gets its own task that sleeps through the dwell
//! time of the running step, asks the probe whether the step may complete and
//! feeds the outcome to the ledger. Stopping a deployment aborts its task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::deploy::fsm::{DeploymentEvent, Transition};
use crate::deploy::pipeline::default_dwell_schedule;
use crate::deploy::probe::{AlwaysPass, StepProbe};
use crate::errors::DeckError;
use crate::services::ledger::Ledger;

type TaskMap = Arc<Mutex<HashMap<String, JoinHandle<()>>>>;

/// Simulator options
#[derive(Clone)]
pub struct Options {
    /// Dwell time per step index
    pub schedule: Vec<Duration>,

    /// Decides whether each step completes or fails
    pub probe: Arc<dyn StepProbe>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            schedule: default_dwell_schedule(),
            probe: Arc::new(AlwaysPass),
        }
    }
}

/// Drives deployments through the pipeline on timers
pub struct Simulator {
    ledger: Arc<Ledger>,
    options: Options,
    tasks: TaskMap,
}

impl Simulator {
    pub fn new(ledger: Arc<Ledger>, options: Options) -> Self {
        Self {
            ledger,
            options,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start driving a deployment. Must be called from within a tokio runtime.
    pub fn start(&self, deployment_id: &str) {
        // Held across spawn so a task that finishes immediately cannot
        // remove its entry before it is inserted.
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if tasks.contains_key(deployment_id) {
            debug!("Deployment {} is already being driven", deployment_id);
            return;
        }

        let handle = tokio::spawn(drive(
            self.ledger.clone(),
            self.options.clone(),
            deployment_id.to_string(),
            self.tasks.clone(),
        ));
        tasks.insert(deployment_id.to_string(), handle);
        debug!("Driving deployment {}", deployment_id);
    }

    /// Stop driving a deployment. Returns whether a task was running.
    pub fn stop(&self, deployment_id: &str) -> bool {
        let handle = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(deployment_id);
        match handle {
            Some(handle) => {
                handle.abort();
                debug!("Stopped driving deployment {}", deployment_id);
                true
            }
            None => false,
        }
    }

    /// Number of deployments currently being driven
    pub fn active(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_driving(&self, deployment_id: &str) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(deployment_id)
    }

    /// Abort every task. Deployments stay where they are in the ledger.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !tasks.is_empty() {
            info!("Stopping {} deployment task(s)", tasks.len());
        }
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn drive(ledger: Arc<Ledger>, options: Options, deployment_id: String, tasks: TaskMap) {
    if let Err(e) = drive_steps(&ledger, &options, &deployment_id).await {
        error!("Driving deployment {} stopped: {}", deployment_id, e);
    }
    tasks
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&deployment_id);
}

async fn drive_steps(ledger: &Ledger, options: &Options, deployment_id: &str) -> Result<(), DeckError> {
    loop {
        let deployment = ledger.get_deployment(deployment_id)?;
        let step = match deployment.running_step() {
            Some(step) if !deployment.status.is_terminal() => step,
            _ => return Ok(()),
        };

        let dwell = options.schedule.get(step).copied().unwrap_or_default();
        tokio::time::sleep(dwell).await;

        // Re-read: the deployment may have been canceled while we slept
        let deployment = ledger.get_deployment(deployment_id)?;
        if deployment.status.is_terminal() {
            return Ok(());
        }

        let event = match options.probe.check(&deployment, step).await {
            Ok(()) => DeploymentEvent::Advance,
            Err(diagnostic) if diagnostic.trim().is_empty() => {
                DeploymentEvent::Fail(format!("{} did not complete", deployment.steps[step].name))
            }
            Err(diagnostic) => DeploymentEvent::Fail(diagnostic),
        };

        match ledger.apply(deployment_id, event) {
            Ok((Transition::Advanced { started, .. }, deployment)) => {
                debug!(
                    "Deployment {} moved to step {}",
                    deployment_id, deployment.steps[started].name
                );
            }
            Ok((transition, deployment)) => {
                info!(
                    "Deployment {} (v{}) finished as {} ({:?})",
                    deployment_id, deployment.version, deployment.status, transition
                );
                return Ok(());
            }
            // Lost a race with a cancel; the terminal state stands
            Err(DeckError::IllegalTransition(_)) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}
