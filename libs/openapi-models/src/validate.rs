//! Validation rules shared by server and client

use thiserror::Error;

use crate::models::{
    App, AppSource, AppStatus, Deployment, DeploymentStatus, DeploymentStep, EnvVar, StepStatus,
};
use crate::requests::{
    AppsListResponse, CreateDeploymentRequest, CreateDeploymentResponse, DeploymentsListResponse,
    LogsResponse, SubdomainCheckResponse, UpdateAppRequest,
};

/// Longest DNS label
pub const MAX_LABEL_LEN: usize = 63;

/// A field that failed validation and why
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Types that can check their own shape before being trusted
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Lowercase alphanumerics and hyphens, no leading or trailing hyphen, 1..=63 chars
pub fn is_valid_subdomain(subdomain: &str) -> bool {
    !subdomain.is_empty()
        && subdomain.len() <= MAX_LABEL_LEN
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-')
        && subdomain
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Turn free text into a subdomain-shaped slug
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

pub fn validate_subdomain(subdomain: &str) -> Result<(), ValidationError> {
    if is_valid_subdomain(subdomain) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "subdomain",
            "must be 1-63 lowercase letters, digits or hyphens, not starting or ending with a hyphen",
        ))
    }
}

pub fn validate_app_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("name", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_LABEL_LEN {
        return Err(ValidationError::new("name", "must be at most 63 characters"));
    }
    Ok(())
}

pub fn validate_port(port: u32) -> Result<u16, ValidationError> {
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(ValidationError::new("port", "must be between 1 and 65535")),
    }
}

pub fn validate_env_vars(env_vars: &[EnvVar]) -> Result<(), ValidationError> {
    match env_vars.iter().position(|var| var.key.trim().is_empty()) {
        Some(i) => Err(ValidationError::new(
            format!("envVars[{}].key", i),
            "must not be empty",
        )),
        None => Ok(()),
    }
}

impl Validate for AppSource {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            AppSource::Github { repository, branch }
            | AppSource::Dockerfile {
                repository, branch, ..
            } => {
                if repository.trim().is_empty() {
                    return Err(ValidationError::new("source.repository", "must not be empty"));
                }
                if branch.trim().is_empty() {
                    return Err(ValidationError::new("source.branch", "must not be empty"));
                }
                Ok(())
            }
            AppSource::DockerImage { image, .. } => {
                if image.trim().is_empty() {
                    return Err(ValidationError::new("source.image", "must not be empty"));
                }
                Ok(())
            }
        }
    }
}

impl Validate for CreateDeploymentRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_app_name(&self.name)?;
        validate_subdomain(&self.subdomain)?;
        self.source.validate()?;
        if let Some(env_vars) = &self.env_vars {
            validate_env_vars(env_vars)?;
        }
        if let Some(port) = self.port {
            validate_port(port)?;
        }
        Ok(())
    }
}

impl Validate for UpdateAppRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_app_name(name)?;
        }
        if let Some(subdomain) = &self.subdomain {
            validate_subdomain(subdomain)?;
        }
        if let Some(env_vars) = &self.env_vars {
            validate_env_vars(env_vars)?;
        }
        if let Some(port) = self.port {
            validate_port(port)?;
        }
        Ok(())
    }
}

/// Check the step and status invariants of a deployment snapshot.
///
/// Completed steps always form a prefix. What may follow the prefix depends
/// on the deployment status:
/// - `succeeded`: nothing, every step is completed
/// - `failed`: exactly one failed step, then only skipped steps
/// - otherwise: at most one running step, then only pending steps
///
/// Only a failed step may carry an error.
impl Validate for Deployment {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.version == 0 {
            return Err(ValidationError::new("version", "must start at 1"));
        }
        if self.steps.is_empty() {
            return Err(ValidationError::new("steps", "must not be empty"));
        }
        if let Some(i) = self
            .steps
            .iter()
            .position(|step| step.error.is_some() && step.status != StepStatus::Failed)
        {
            return Err(ValidationError::new(
                format!("steps[{}].error", i),
                "only a failed step carries an error",
            ));
        }

        let prefix = self
            .steps
            .iter()
            .take_while(|step| step.status == StepStatus::Completed)
            .count();
        let rest = &self.steps[prefix..];

        let only = |steps: &[DeploymentStep], status: StepStatus| {
            steps.iter().all(|step| step.status == status)
        };

        match self.status {
            DeploymentStatus::Succeeded => {
                if !rest.is_empty() {
                    return Err(ValidationError::new(
                        "steps",
                        "succeeded deployment has unfinished steps",
                    ));
                }
            }
            DeploymentStatus::Failed => {
                let Some((failed, after)) = rest.split_first() else {
                    return Err(ValidationError::new("steps", "failed deployment has no failed step"));
                };
                if failed.status != StepStatus::Failed {
                    return Err(ValidationError::new(
                        format!("steps[{}].status", prefix),
                        "expected the first unfinished step to be failed",
                    ));
                }
                if failed.error.as_deref().map_or(true, str::is_empty) {
                    return Err(ValidationError::new(
                        format!("steps[{}].error", prefix),
                        "failed step must carry an error",
                    ));
                }
                if !only(after, StepStatus::Skipped) {
                    return Err(ValidationError::new(
                        "steps",
                        "steps after a failed step must be skipped",
                    ));
                }
                if self.error.as_deref().map_or(true, str::is_empty) {
                    return Err(ValidationError::new("error", "failed deployment must carry an error"));
                }
            }
            DeploymentStatus::Queued | DeploymentStatus::Running | DeploymentStatus::Canceled => {
                let after: &[DeploymentStep] = match rest.split_first() {
                    Some((first, after))
                        if matches!(first.status, StepStatus::Running | StepStatus::Pending) =>
                    {
                        after
                    }
                    Some(_) => {
                        return Err(ValidationError::new(
                            format!("steps[{}].status", prefix),
                            format!("unexpected step status for a {} deployment", self.status),
                        ))
                    }
                    None => &[],
                };
                if !only(after, StepStatus::Pending) {
                    return Err(ValidationError::new(
                        "steps",
                        "steps after the running step must be pending",
                    ));
                }
                if self.status == DeploymentStatus::Queued && prefix > 0 {
                    return Err(ValidationError::new(
                        "status",
                        "queued deployment cannot have completed steps",
                    ));
                }
            }
        }

        if self.status != DeploymentStatus::Failed && self.error.is_some() {
            return Err(ValidationError::new(
                "error",
                "only failed deployments carry an error",
            ));
        }
        if self.status.is_terminal() && self.completed_at.is_none() {
            return Err(ValidationError::new(
                "completedAt",
                "terminal deployment must be stamped",
            ));
        }
        if !self.status.is_terminal() && self.completed_at.is_some() {
            return Err(ValidationError::new(
                "completedAt",
                "in-flight deployment cannot be completed",
            ));
        }
        Ok(())
    }
}

impl Validate for App {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_subdomain(&self.subdomain)?;
        validate_env_vars(&self.env_vars)?;
        if self.port == 0 {
            return Err(ValidationError::new("port", "must be between 1 and 65535"));
        }
        if self.status == AppStatus::Live && self.url.is_none() {
            return Err(ValidationError::new("url", "live app must have a url"));
        }
        if let Some(deployment) = &self.latest_deployment {
            if deployment.app_id != self.id {
                return Err(ValidationError::new(
                    "latestDeployment.appId",
                    "does not belong to this app",
                ));
            }
            deployment.validate()?;
        }
        Ok(())
    }
}

impl Validate for AppsListResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.total < self.apps.len() {
            return Err(ValidationError::new("total", "smaller than the returned page"));
        }
        self.apps.iter().try_for_each(Validate::validate)
    }
}

impl Validate for DeploymentsListResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        self.deployments.iter().try_for_each(Validate::validate)
    }
}

impl Validate for CreateDeploymentResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.deployment.app_id != self.app.id {
            return Err(ValidationError::new(
                "deployment.appId",
                "does not match the created app",
            ));
        }
        self.app.validate()?;
        self.deployment.validate()
    }
}

impl Validate for LogsResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.has_more && self.cursor.is_none() {
            return Err(ValidationError::new("cursor", "required when more logs exist"));
        }
        Ok(())
    }
}

impl Validate for SubdomainCheckResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.subdomain.is_empty() {
            return Err(ValidationError::new("subdomain", "must not be empty"));
        }
        Ok(())
    }
}
