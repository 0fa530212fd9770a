//! Authoritative in-memory ledger of apps, deployments and their logs
//!
//! Every mutation runs under a single write lock and every lifecycle change
//! goes through [`fsm::process`], so a timer tick racing a cancel can never
//! touch a deployment that already reached a terminal state.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use openapi_models::validate::MAX_LABEL_LEN;
use openapi_models::{
    App, AppSource, Deployment, DeploymentStatus, EnvVar, LogEntry, LogSeverity, LogsResponse,
    Plan, SubdomainCheckResponse, UpdateAppRequest, ValidationError,
};

use crate::deploy::fsm::{self, DeploymentEvent, Transition};
use crate::deploy::pipeline::{app_url, new_deployment};
use crate::errors::DeckError;
use crate::utils::generate_id;

const LOG_SOURCE: &str = "deployment";

/// Settings captured when an app is created
#[derive(Debug, Clone)]
pub struct NewApp {
    pub name: String,
    pub subdomain: String,
    pub source: AppSource,
    pub plan: Plan,
    pub env_vars: Vec<EnvVar>,
    pub build_command: Option<String>,
    pub start_command: Option<String>,
    pub port: u16,
}

/// Stored app. Status is never stored; it is derived from the latest deployment.
#[derive(Debug, Clone)]
struct AppRecord {
    id: String,
    name: String,
    subdomain: String,
    url: Option<String>,
    source: AppSource,
    plan: Plan,
    env_vars: Vec<EnvVar>,
    build_command: Option<String>,
    start_command: Option<String>,
    port: u16,
    latest_deployment_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerInner {
    apps: HashMap<String, AppRecord>,
    /// App ids in creation order
    app_order: Vec<String>,
    deployments: HashMap<String, Deployment>,
    /// Deployment ids per app, in version order
    history: HashMap<String, Vec<String>>,
    logs: HashMap<String, Vec<LogEntry>>,
    /// Subdomain -> owning app id
    subdomains: HashMap<String, String>,
}

/// Ledger of apps and deployments
pub struct Ledger {
    inner: RwLock<LedgerInner>,
    platform_domain: String,
}

impl Ledger {
    /// Create an empty ledger serving apps under `platform_domain`
    pub fn new(platform_domain: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(LedgerInner::default()),
            platform_domain: platform_domain.into(),
        }
    }

    /// Create an app and its first deployment (version 1)
    pub fn create_app(&self, new_app: NewApp) -> Result<(App, Deployment), DeckError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if inner.subdomains.contains_key(&new_app.subdomain) {
            let suggestion = inner.suggest_subdomain(&new_app.subdomain);
            return Err(DeckError::conflict(
                format!("Subdomain '{}' is already taken", new_app.subdomain),
                Some(suggestion),
            ));
        }

        let now = Utc::now();
        let app_id = generate_id("app");
        let deployment = new_deployment(&app_id, 1, new_app.source.clone(), now);

        let record = AppRecord {
            id: app_id.clone(),
            name: new_app.name,
            subdomain: new_app.subdomain.clone(),
            url: None,
            source: new_app.source,
            plan: new_app.plan,
            env_vars: new_app.env_vars,
            build_command: new_app.build_command,
            start_command: new_app.start_command,
            port: new_app.port,
            latest_deployment_id: Some(deployment.id.clone()),
            created_at: now,
            updated_at: now,
        };

        inner.subdomains.insert(new_app.subdomain, app_id.clone());
        inner.apps.insert(app_id.clone(), record);
        inner.app_order.push(app_id.clone());
        inner.insert_deployment(deployment.clone(), now);

        let app = inner.materialize(&app_id)?;
        Ok((app, deployment))
    }

    pub fn get_app(&self, app_id: &str) -> Result<App, DeckError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.materialize(app_id)
    }

    /// All apps in creation order
    pub fn list_apps(&self) -> Vec<App> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .app_order
            .iter()
            .filter_map(|id| inner.materialize(id).ok())
            .collect()
    }

    /// Apply a partial settings update. Fields must already be validated.
    pub fn update_app(&self, app_id: &str, update: UpdateAppRequest) -> Result<App, DeckError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let current_subdomain = inner.app(app_id)?.subdomain.clone();

        if let Some(subdomain) = &update.subdomain {
            if *subdomain != current_subdomain && inner.subdomains.contains_key(subdomain) {
                let suggestion = inner.suggest_subdomain(subdomain);
                return Err(DeckError::conflict(
                    format!("Subdomain '{}' is already taken", subdomain),
                    Some(suggestion),
                ));
            }
        }

        let port = match update.port {
            Some(port) => Some(openapi_models::validate::validate_port(port)?),
            None => None,
        };

        if let Some(subdomain) = &update.subdomain {
            inner.subdomains.remove(&current_subdomain);
            inner.subdomains.insert(subdomain.clone(), app_id.to_string());
        }

        let platform_domain = self.platform_domain.clone();
        let record = inner.app_mut(app_id)?;
        if let Some(name) = update.name {
            record.name = name.trim().to_string();
        }
        if let Some(subdomain) = update.subdomain {
            if record.url.is_some() {
                record.url = Some(app_url(&subdomain, &platform_domain));
            }
            record.subdomain = subdomain;
        }
        if let Some(env_vars) = update.env_vars {
            record.env_vars = env_vars;
        }
        if let Some(cmd) = update.build_command {
            record.build_command = non_blank(cmd);
        }
        if let Some(cmd) = update.start_command {
            record.start_command = non_blank(cmd);
        }
        if let Some(port) = port {
            record.port = port;
        }
        record.updated_at = Utc::now();

        inner.materialize(app_id)
    }

    /// Remove an app and free its subdomain.
    ///
    /// An in-flight deployment is canceled; its id is returned so the caller
    /// can stop whatever drives it. Deployment history stays readable by id.
    pub fn delete_app(&self, app_id: &str) -> Result<Option<String>, DeckError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let record = inner.app(app_id)?.clone();

        let mut canceled = None;
        if let Some(deployment_id) = &record.latest_deployment_id {
            let in_flight = inner
                .deployments
                .get(deployment_id)
                .is_some_and(|d| !d.status.is_terminal());
            if in_flight {
                inner.apply(deployment_id, DeploymentEvent::Cancel, &self.platform_domain)?;
                canceled = Some(deployment_id.clone());
            }
        }

        inner.subdomains.remove(&record.subdomain);
        inner.apps.remove(app_id);
        inner.app_order.retain(|id| id != app_id);
        inner.history.remove(app_id);
        Ok(canceled)
    }

    /// Start a new deployment of the app's current source.
    /// Only accepted when the latest deployment succeeded.
    pub fn redeploy(&self, app_id: &str) -> Result<Deployment, DeckError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let record = inner.app(app_id)?;
        let latest = record
            .latest_deployment_id
            .as_ref()
            .and_then(|id| inner.deployments.get(id));
        fsm::check_redeploy(app_id, latest)?;

        let source = record.source.clone();
        Ok(inner.next_attempt(app_id, source))
    }

    /// Start a new deployment from a failed one, reusing its source snapshot
    pub fn retry(&self, deployment_id: &str) -> Result<Deployment, DeckError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let previous = inner.deployment(deployment_id)?;
        fsm::check_retry(previous)?;

        let app_id = previous.app_id.clone();
        let source = previous.source.clone();
        let record = inner.app(&app_id)?;

        if let Some(latest) = record
            .latest_deployment_id
            .as_ref()
            .and_then(|id| inner.deployments.get(id))
        {
            if !latest.status.is_terminal() {
                return Err(DeckError::IllegalTransition(format!(
                    "App {} already has deployment {} in progress",
                    app_id, latest.id
                )));
            }
        }

        Ok(inner.next_attempt(&app_id, source))
    }

    pub fn get_deployment(&self, deployment_id: &str) -> Result<Deployment, DeckError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.deployment(deployment_id).cloned()
    }

    /// Deployments of an app in version order
    pub fn list_app_deployments(&self, app_id: &str) -> Result<Vec<Deployment>, DeckError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.app(app_id)?;
        Ok(inner
            .history
            .get(app_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.deployments.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Apply a lifecycle event to a deployment and propagate it to the owning app
    pub fn apply(
        &self,
        deployment_id: &str,
        event: DeploymentEvent,
    ) -> Result<(Transition, Deployment), DeckError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let transition = inner.apply(deployment_id, event, &self.platform_domain)?;
        Ok((transition, inner.deployment(deployment_id)?.clone()))
    }

    /// Subdomain availability with an alternative when taken
    pub fn check_subdomain(&self, subdomain: &str) -> SubdomainCheckResponse {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let available = !inner.subdomains.contains_key(subdomain);
        SubdomainCheckResponse {
            available,
            subdomain: subdomain.to_string(),
            suggestion: (!available).then(|| inner.suggest_subdomain(subdomain)),
        }
    }

    pub fn deployment_logs(
        &self,
        deployment_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<LogsResponse, DeckError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.deployment(deployment_id)?;
        let entries = inner.logs.get(deployment_id).map(Vec::as_slice).unwrap_or(&[]);
        page(entries, cursor, limit)
    }

    /// Logs of every deployment of an app, concatenated in version order.
    /// Only the latest deployment can still grow, so earlier offsets stay stable.
    pub fn app_logs(
        &self,
        app_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<LogsResponse, DeckError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.app(app_id)?;
        let entries: Vec<LogEntry> = inner
            .history
            .get(app_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.logs.get(id))
            .flatten()
            .cloned()
            .collect();
        page(&entries, cursor, limit)
    }
}

impl LedgerInner {
    fn app(&self, app_id: &str) -> Result<&AppRecord, DeckError> {
        self.apps
            .get(app_id)
            .ok_or_else(|| DeckError::NotFound(format!("App {} not found", app_id)))
    }

    fn app_mut(&mut self, app_id: &str) -> Result<&mut AppRecord, DeckError> {
        self.apps
            .get_mut(app_id)
            .ok_or_else(|| DeckError::NotFound(format!("App {} not found", app_id)))
    }

    fn deployment(&self, deployment_id: &str) -> Result<&Deployment, DeckError> {
        self.deployments
            .get(deployment_id)
            .ok_or_else(|| DeckError::NotFound(format!("Deployment {} not found", deployment_id)))
    }

    fn materialize(&self, app_id: &str) -> Result<App, DeckError> {
        let record = self.app(app_id)?;
        let latest = record
            .latest_deployment_id
            .as_ref()
            .and_then(|id| self.deployments.get(id))
            .cloned();

        Ok(App {
            id: record.id.clone(),
            name: record.name.clone(),
            subdomain: record.subdomain.clone(),
            status: fsm::derive_app_status(latest.as_ref().map(|d| d.status)),
            url: record.url.clone(),
            source: record.source.clone(),
            plan: record.plan,
            env_vars: record.env_vars.clone(),
            build_command: record.build_command.clone(),
            start_command: record.start_command.clone(),
            port: record.port,
            latest_deployment: latest,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    fn insert_deployment(&mut self, deployment: Deployment, now: DateTime<Utc>) {
        let id = deployment.id.clone();
        self.history
            .entry(deployment.app_id.clone())
            .or_default()
            .push(id.clone());
        self.log(
            &id,
            now,
            LogSeverity::Info,
            format!("Deployment v{} queued", deployment.version),
        );
        self.deployments.insert(id, deployment);
    }

    /// Mint the next version for an app and make it the latest deployment
    fn next_attempt(&mut self, app_id: &str, source: AppSource) -> Deployment {
        let now = Utc::now();
        let version = self
            .history
            .get(app_id)
            .and_then(|ids| ids.last())
            .and_then(|id| self.deployments.get(id))
            .map_or(1, |d| d.version + 1);

        let deployment = new_deployment(app_id, version, source, now);
        self.insert_deployment(deployment.clone(), now);
        if let Some(record) = self.apps.get_mut(app_id) {
            record.latest_deployment_id = Some(deployment.id.clone());
            record.updated_at = now;
        }
        deployment
    }

    fn apply(
        &mut self,
        deployment_id: &str,
        event: DeploymentEvent,
        platform_domain: &str,
    ) -> Result<Transition, DeckError> {
        let now = Utc::now();
        let deployment = self
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| DeckError::NotFound(format!("Deployment {} not found", deployment_id)))?;
        let was_queued = deployment.status == DeploymentStatus::Queued;
        let transition = fsm::process(deployment, event, now)?;
        let deployment = deployment.clone();

        let mut lines = Vec::new();
        match &transition {
            Transition::Advanced { completed, started } => {
                if was_queued {
                    lines.push((
                        LogSeverity::Info,
                        format!("Deployment v{} started", deployment.version),
                    ));
                }
                lines.push((
                    LogSeverity::Info,
                    format!("{} completed", deployment.steps[*completed].name),
                ));
                lines.push((
                    LogSeverity::Info,
                    format!("{} started", deployment.steps[*started].name),
                ));
            }
            Transition::Succeeded { completed } => {
                lines.push((
                    LogSeverity::Info,
                    format!("{} completed", deployment.steps[*completed].name),
                ));
            }
            Transition::Failed { step } => {
                let step = &deployment.steps[*step];
                lines.push((
                    LogSeverity::Error,
                    format!(
                        "{} failed: {}",
                        step.name,
                        step.error.as_deref().unwrap_or_default()
                    ),
                ));
                lines.push((
                    LogSeverity::Warn,
                    "Skipping remaining steps".to_string(),
                ));
            }
            Transition::Canceled => {
                lines.push((
                    LogSeverity::Warn,
                    format!("Deployment v{} canceled", deployment.version),
                ));
            }
        }

        let is_latest = self.apps.get(&deployment.app_id).is_some_and(|record| {
            record.latest_deployment_id.as_deref() == Some(deployment.id.as_str())
        });
        if is_latest && deployment.status.is_terminal() {
            if let Some(record) = self.apps.get_mut(&deployment.app_id) {
                if deployment.status == DeploymentStatus::Succeeded {
                    let url = app_url(&record.subdomain, platform_domain);
                    lines.push((
                        LogSeverity::Info,
                        format!("Deployment v{} is live at {}", deployment.version, url),
                    ));
                    record.url = Some(url);
                }
                record.updated_at = now;
            }
        }

        for (level, message) in lines {
            self.log(deployment_id, now, level, message);
        }
        Ok(transition)
    }

    fn log(&mut self, deployment_id: &str, now: DateTime<Utc>, level: LogSeverity, message: String) {
        self.logs
            .entry(deployment_id.to_string())
            .or_default()
            .push(LogEntry {
                timestamp: now,
                level,
                message,
                source: Some(LOG_SOURCE.to_string()),
            });
    }

    /// `<base>-<n>` for the smallest free `n >= 2`, trimmed to a valid label
    fn suggest_subdomain(&self, base: &str) -> String {
        (2u32..)
            .map(|n| {
                let suffix = format!("-{}", n);
                let keep = MAX_LABEL_LEN.saturating_sub(suffix.len()).min(base.len());
                format!("{}{}", base[..keep].trim_end_matches('-'), suffix)
            })
            .find(|candidate| !self.subdomains.contains_key(candidate))
            .unwrap_or_else(|| format!("{}-{}", base, uuid::Uuid::new_v4().simple()))
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn page(entries: &[LogEntry], cursor: Option<&str>, limit: usize) -> Result<LogsResponse, DeckError> {
    let offset = match cursor.filter(|c| !c.is_empty()) {
        Some(cursor) => cursor
            .parse::<usize>()
            .map_err(|_| ValidationError::new("cursor", "must be a cursor returned by a previous page"))?,
        None => 0,
    };
    let start = offset.min(entries.len());
    let end = start.saturating_add(limit.max(1)).min(entries.len());

    Ok(LogsResponse {
        logs: entries[start..end].to_vec(),
        cursor: Some(end.to_string()),
        has_more: end < entries.len(),
    })
}
