//! Finite State Machine for deployments and their steps

use chrono::{DateTime, Utc};
use openapi_models::{AppStatus, Deployment, DeploymentStatus, StepStatus};

use crate::errors::DeckError;

/// Deployment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// Complete the running step and start the next one
    Advance,

    /// The running step failed with a diagnostic
    Fail(String),

    /// Stop the deployment where it is
    Cancel,
}

/// What a processed event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Step `completed` finished and step `started` began
    Advanced { completed: usize, started: usize },

    /// The last step finished
    Succeeded { completed: usize },

    /// Step `step` failed; everything after it was skipped
    Failed { step: usize },

    Canceled,
}

/// Apply an event to a deployment.
///
/// The deployment is left untouched when the event is rejected.
pub fn process(
    deployment: &mut Deployment,
    event: DeploymentEvent,
    now: DateTime<Utc>,
) -> Result<Transition, DeckError> {
    if deployment.status.is_terminal() {
        return Err(DeckError::IllegalTransition(format!(
            "Deployment {} is already {}",
            deployment.id, deployment.status
        )));
    }

    match event {
        DeploymentEvent::Advance => advance(deployment, now),
        DeploymentEvent::Fail(error) => fail(deployment, error, now),
        DeploymentEvent::Cancel => {
            deployment.status = DeploymentStatus::Canceled;
            deployment.completed_at = Some(now);
            Ok(Transition::Canceled)
        }
    }
}

fn running_step(deployment: &Deployment) -> Result<usize, DeckError> {
    deployment.running_step().ok_or_else(|| {
        DeckError::IllegalTransition(format!(
            "Deployment {} has no step in progress",
            deployment.id
        ))
    })
}

fn advance(deployment: &mut Deployment, now: DateTime<Utc>) -> Result<Transition, DeckError> {
    let current = running_step(deployment)?;

    if deployment.status == DeploymentStatus::Queued {
        deployment.status = DeploymentStatus::Running;
        deployment.started_at = Some(now);
    }

    let step = &mut deployment.steps[current];
    step.status = StepStatus::Completed;
    step.completed_at = Some(now);

    let next = current + 1;
    match deployment.steps.get_mut(next) {
        Some(step) => {
            step.status = StepStatus::Running;
            step.started_at = Some(now);
            Ok(Transition::Advanced {
                completed: current,
                started: next,
            })
        }
        None => {
            deployment.status = DeploymentStatus::Succeeded;
            deployment.completed_at = Some(now);
            Ok(Transition::Succeeded { completed: current })
        }
    }
}

fn fail(
    deployment: &mut Deployment,
    error: String,
    now: DateTime<Utc>,
) -> Result<Transition, DeckError> {
    if error.trim().is_empty() {
        return Err(DeckError::Precondition(
            "A step failure needs a diagnostic message".to_string(),
        ));
    }
    let current = running_step(deployment)?;

    let step = &mut deployment.steps[current];
    step.status = StepStatus::Failed;
    step.completed_at = Some(now);
    let summary = format!("{} failed: {}", step.name, error);
    step.error = Some(error);

    for step in deployment.steps.iter_mut().skip(current + 1) {
        step.status = StepStatus::Skipped;
    }

    if deployment.started_at.is_none() {
        deployment.started_at = Some(now);
    }
    deployment.status = DeploymentStatus::Failed;
    deployment.error = Some(summary);
    deployment.completed_at = Some(now);
    Ok(Transition::Failed { step: current })
}

/// Retry is only accepted for a failed deployment
pub fn check_retry(deployment: &Deployment) -> Result<(), DeckError> {
    if deployment.status != DeploymentStatus::Failed {
        return Err(DeckError::IllegalTransition(format!(
            "Only failed deployments can be retried; {} is {}",
            deployment.id, deployment.status
        )));
    }
    Ok(())
}

/// Redeploy is only accepted when the app's latest deployment succeeded
pub fn check_redeploy(app_id: &str, latest: Option<&Deployment>) -> Result<(), DeckError> {
    match latest {
        Some(deployment) if deployment.status == DeploymentStatus::Succeeded => Ok(()),
        Some(deployment) => Err(DeckError::IllegalTransition(format!(
            "App {} can only be redeployed after a successful deployment; latest is {}",
            app_id, deployment.status
        ))),
        None => Err(DeckError::IllegalTransition(format!(
            "App {} has never been deployed",
            app_id
        ))),
    }
}

/// App status as a function of its latest deployment
pub fn derive_app_status(latest: Option<DeploymentStatus>) -> AppStatus {
    match latest {
        Some(DeploymentStatus::Queued) | Some(DeploymentStatus::Running) => AppStatus::Deploying,
        Some(DeploymentStatus::Succeeded) => AppStatus::Live,
        Some(DeploymentStatus::Failed) => AppStatus::Failed,
        Some(DeploymentStatus::Canceled) | None => AppStatus::Stopped,
    }
}
