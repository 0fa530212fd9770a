//! Platform operations behind the REST API
//!
//! Validates requests, mutates the ledger and keeps the simulator in step
//! with it: every new deployment is driven, every cancel stops its driver.

use std::sync::Arc;

use openapi_models::validate::{validate_port, validate_subdomain};
use openapi_models::{
    App, AppsListResponse, CreateDeploymentRequest, CreateDeploymentResponse, Deployment,
    DeploymentsListResponse, LogsResponse, SubdomainCheckResponse, UpdateAppRequest, Validate,
};
use tracing::info;

use crate::deploy::fsm::DeploymentEvent;
use crate::errors::DeckError;
use crate::services::ledger::{Ledger, NewApp};
use crate::workers::simulator::Simulator;

/// Port used when a request does not name one
pub const DEFAULT_PORT: u16 = 3000;

/// Largest log page a caller may request
pub const MAX_LOGS_PAGE: usize = 1000;

pub struct PlatformService {
    ledger: Arc<Ledger>,
    simulator: Arc<Simulator>,
    logs_page_size: usize,
}

impl PlatformService {
    pub fn new(ledger: Arc<Ledger>, simulator: Arc<Simulator>, logs_page_size: usize) -> Self {
        Self {
            ledger,
            simulator,
            logs_page_size,
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn simulator(&self) -> &Arc<Simulator> {
        &self.simulator
    }

    /// Create an app with its first deployment and start driving it
    pub fn create_deployment(
        &self,
        request: CreateDeploymentRequest,
    ) -> Result<CreateDeploymentResponse, DeckError> {
        request.validate()?;
        let port = match request.port {
            Some(port) => validate_port(port)?,
            None => DEFAULT_PORT,
        };

        let (app, deployment) = self.ledger.create_app(NewApp {
            name: request.name.trim().to_string(),
            subdomain: request.subdomain,
            source: request.source,
            plan: request.plan,
            env_vars: request.env_vars.unwrap_or_default(),
            build_command: request.build_command.filter(|c| !c.trim().is_empty()),
            start_command: request.start_command.filter(|c| !c.trim().is_empty()),
            port,
        })?;

        info!(
            "Created app {} ({}) with deployment {}",
            app.id, app.subdomain, deployment.id
        );
        self.simulator.start(&deployment.id);
        Ok(CreateDeploymentResponse { app, deployment })
    }

    pub fn list_apps(&self) -> AppsListResponse {
        let apps = self.ledger.list_apps();
        AppsListResponse {
            total: apps.len(),
            apps,
        }
    }

    pub fn get_app(&self, app_id: &str) -> Result<App, DeckError> {
        self.ledger.get_app(app_id)
    }

    pub fn update_app(&self, app_id: &str, update: UpdateAppRequest) -> Result<App, DeckError> {
        update.validate()?;
        let app = self.ledger.update_app(app_id, update)?;
        info!("Updated settings of app {}", app_id);
        Ok(app)
    }

    pub fn delete_app(&self, app_id: &str) -> Result<(), DeckError> {
        if let Some(deployment_id) = self.ledger.delete_app(app_id)? {
            self.simulator.stop(&deployment_id);
        }
        info!("Deleted app {}", app_id);
        Ok(())
    }

    pub fn redeploy(&self, app_id: &str) -> Result<Deployment, DeckError> {
        let deployment = self.ledger.redeploy(app_id)?;
        info!(
            "Redeploying app {} as v{} ({})",
            app_id, deployment.version, deployment.id
        );
        self.simulator.start(&deployment.id);
        Ok(deployment)
    }

    pub fn list_app_deployments(&self, app_id: &str) -> Result<DeploymentsListResponse, DeckError> {
        Ok(DeploymentsListResponse {
            deployments: self.ledger.list_app_deployments(app_id)?,
        })
    }

    pub fn app_logs(
        &self,
        app_id: &str,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<LogsResponse, DeckError> {
        let limit = self.page_limit(limit)?;
        self.ledger.app_logs(app_id, cursor, limit)
    }

    pub fn get_deployment(&self, deployment_id: &str) -> Result<Deployment, DeckError> {
        self.ledger.get_deployment(deployment_id)
    }

    /// Cancel an in-flight deployment; later steps keep their status
    pub fn cancel_deployment(&self, deployment_id: &str) -> Result<Deployment, DeckError> {
        let (_, deployment) = self.ledger.apply(deployment_id, DeploymentEvent::Cancel)?;
        self.simulator.stop(deployment_id);
        info!("Canceled deployment {}", deployment_id);
        Ok(deployment)
    }

    /// Start a fresh deployment from a failed one
    pub fn retry_deployment(&self, deployment_id: &str) -> Result<Deployment, DeckError> {
        let deployment = self.ledger.retry(deployment_id)?;
        info!(
            "Retrying deployment {} as v{} ({})",
            deployment_id, deployment.version, deployment.id
        );
        self.simulator.start(&deployment.id);
        Ok(deployment)
    }

    pub fn deployment_logs(
        &self,
        deployment_id: &str,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<LogsResponse, DeckError> {
        let limit = self.page_limit(limit)?;
        self.ledger.deployment_logs(deployment_id, cursor, limit)
    }

    pub fn check_subdomain(&self, subdomain: &str) -> Result<SubdomainCheckResponse, DeckError> {
        validate_subdomain(subdomain)?;
        Ok(self.ledger.check_subdomain(subdomain))
    }

    /// Stop driving every deployment
    pub fn shutdown(&self) {
        self.simulator.shutdown();
    }

    fn page_limit(&self, limit: Option<usize>) -> Result<usize, DeckError> {
        match limit {
            None => Ok(self.logs_page_size),
            Some(0) => Err(openapi_models::ValidationError::new("limit", "must be at least 1").into()),
            Some(limit) => Ok(limit.min(MAX_LOGS_PAGE)),
        }
    }
}
