//! Deployment wizard draft
//!
//! The draft holds every field of the multi-step creation form. Each step has
//! a completion predicate over the current fields; moving forward to a step
//! requires all earlier steps to be complete, moving back is always allowed.

use std::fmt;

use openapi_models::validate::{is_valid_subdomain, slugify};
use openapi_models::{AppSource, CreateDeploymentRequest, EnvVar, Plan, SourceType};
use serde::{Deserialize, Serialize};

use crate::errors::DeckError;

/// Wizard steps in order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    #[default]
    Source,
    Build,
    Configure,
    Plan,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Source,
        WizardStep::Build,
        WizardStep::Configure,
        WizardStep::Plan,
        WizardStep::Review,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn next(&self) -> Option<WizardStep> {
        WizardStep::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(&self) -> Option<WizardStep> {
        self.index().checked_sub(1).map(|i| WizardStep::ALL[i])
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardStep::Source => "source",
            WizardStep::Build => "build",
            WizardStep::Configure => "configure",
            WizardStep::Plan => "plan",
            WizardStep::Review => "review",
        };
        f.write_str(name)
    }
}

/// Which field of an env var row to edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVarField {
    Key,
    Value,
}

/// In-progress state of the deployment wizard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Draft {
    pub current_step: WizardStep,

    // Source
    pub source_type: Option<SourceType>,
    pub repository: String,
    pub branch: String,
    pub dockerfile_path: String,
    pub docker_image: String,
    pub docker_tag: String,

    // Build & runtime
    pub build_command: String,
    pub start_command: String,
    /// Kept wide so out-of-range input can be held and rejected by the gate
    pub port: u32,

    // Configure
    pub app_name: String,
    pub subdomain: String,
    pub env_vars: Vec<EnvVar>,

    // Plan
    pub selected_plan: String,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            current_step: WizardStep::Source,
            source_type: None,
            repository: String::new(),
            branch: "main".to_string(),
            dockerfile_path: "Dockerfile".to_string(),
            docker_image: String::new(),
            docker_tag: "latest".to_string(),
            build_command: String::new(),
            start_command: String::new(),
            port: 3000,
            app_name: String::new(),
            subdomain: String::new(),
            env_vars: Vec::new(),
            selected_plan: Plan::default().as_str().to_string(),
        }
    }
}

impl Draft {
    /// Whether `step` is complete given the current fields
    pub fn can_proceed(&self, step: WizardStep) -> bool {
        match step {
            WizardStep::Source => match self.source_type {
                Some(SourceType::Github) | Some(SourceType::Dockerfile) => {
                    !self.repository.is_empty() && !self.branch.is_empty()
                }
                Some(SourceType::DockerImage) => !self.docker_image.is_empty(),
                None => false,
            },
            WizardStep::Build => self.port > 0 && self.port < 65536,
            WizardStep::Configure => {
                !self.app_name.trim().is_empty() && is_valid_subdomain(&self.subdomain)
            }
            WizardStep::Plan => self.selected_plan.parse::<Plan>().is_ok(),
            WizardStep::Review => true,
        }
    }

    /// Whether every step before `step` is complete
    pub fn can_navigate_to(&self, step: WizardStep) -> bool {
        step <= self.current_step
            || WizardStep::ALL[..step.index()]
                .iter()
                .all(|s| self.can_proceed(*s))
    }

    /// Move to `step`. Backward moves always succeed; forward moves need
    /// every earlier step complete. Returns whether the move happened.
    pub fn navigate_to(&mut self, step: WizardStep) -> bool {
        if !self.can_navigate_to(step) {
            return false;
        }
        self.current_step = step;
        true
    }

    /// Advance one step if the current one is complete
    pub fn next_step(&mut self) -> bool {
        match self.current_step.next() {
            Some(step) => self.navigate_to(step),
            None => false,
        }
    }

    pub fn previous_step(&mut self) -> bool {
        match self.current_step.previous() {
            Some(step) => self.navigate_to(step),
            None => false,
        }
    }

    /// Set the app name, keeping an auto-derived subdomain in sync with it.
    ///
    /// The subdomain follows the name while it is empty or still equals the
    /// slug of the previous name; once edited by hand it is left alone.
    pub fn set_app_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.subdomain.is_empty() || self.subdomain == slugify(&self.app_name) {
            self.subdomain = slugify(&name);
        }
        self.app_name = name;
    }

    pub fn set_subdomain(&mut self, subdomain: &str) {
        self.subdomain = subdomain.to_lowercase();
    }

    /// Append an empty env var row
    pub fn add_env_var(&mut self) {
        self.env_vars.push(EnvVar {
            key: String::new(),
            value: String::new(),
        });
    }

    /// Edit one field of the row at `index`; out-of-range indexes are ignored
    pub fn update_env_var(&mut self, index: usize, field: EnvVarField, value: impl Into<String>) {
        if let Some(row) = self.env_vars.get_mut(index) {
            match field {
                EnvVarField::Key => row.key = value.into(),
                EnvVarField::Value => row.value = value.into(),
            }
        }
    }

    pub fn remove_env_var(&mut self, index: usize) {
        if index < self.env_vars.len() {
            self.env_vars.remove(index);
        }
    }

    /// The source described by the draft, if a source type was chosen
    pub fn source(&self) -> Option<AppSource> {
        match self.source_type? {
            SourceType::Github => Some(AppSource::Github {
                repository: self.repository.clone(),
                branch: self.branch.clone(),
            }),
            SourceType::Dockerfile => Some(AppSource::Dockerfile {
                repository: self.repository.clone(),
                branch: self.branch.clone(),
                dockerfile_path: Some(self.dockerfile_path.clone()),
            }),
            SourceType::DockerImage => Some(AppSource::DockerImage {
                image: self.docker_image.clone(),
                tag: Some(self.docker_tag.clone()),
            }),
        }
    }

    /// Map the draft to a creation request.
    ///
    /// Fails without a source type or with an unknown plan. Env var rows
    /// missing a key or value are dropped; blank commands become absent.
    pub fn to_request(&self) -> Result<CreateDeploymentRequest, DeckError> {
        let source = self.source().ok_or_else(|| {
            DeckError::Precondition("No source type selected".to_string())
        })?;
        let plan = self
            .selected_plan
            .parse::<Plan>()
            .map_err(DeckError::Precondition)?;

        let env_vars: Vec<EnvVar> = self
            .env_vars
            .iter()
            .filter(|var| !var.key.is_empty() && !var.value.is_empty())
            .cloned()
            .collect();

        Ok(CreateDeploymentRequest {
            name: self.app_name.clone(),
            subdomain: self.subdomain.clone(),
            source,
            plan,
            env_vars: Some(env_vars),
            build_command: non_blank(&self.build_command),
            start_command: non_blank(&self.start_command),
            port: Some(self.port),
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
