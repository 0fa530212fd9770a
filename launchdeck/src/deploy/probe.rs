//! Step probes decide whether a pipeline step may complete

use async_trait::async_trait;
use openapi_models::Deployment;

/// Probe consulted by the driver before it completes a step
#[async_trait]
pub trait StepProbe: Send + Sync {
    /// `Ok` lets the step complete; `Err` carries the step-specific diagnostic
    /// and fails the deployment at that step.
    async fn check(&self, deployment: &Deployment, step: usize) -> Result<(), String>;
}

/// Probe that never fails a step
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPass;

#[async_trait]
impl StepProbe for AlwaysPass {
    async fn check(&self, _deployment: &Deployment, _step: usize) -> Result<(), String> {
        Ok(())
    }
}

/// Probe that fails one step by index with a fixed diagnostic
#[derive(Debug, Clone)]
pub struct FailAtStep {
    pub step: usize,
    pub error: String,
}

impl FailAtStep {
    pub fn new(step: usize, error: impl Into<String>) -> Self {
        Self {
            step,
            error: error.into(),
        }
    }
}

#[async_trait]
impl StepProbe for FailAtStep {
    async fn check(&self, _deployment: &Deployment, step: usize) -> Result<(), String> {
        if step == self.step {
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }
}
