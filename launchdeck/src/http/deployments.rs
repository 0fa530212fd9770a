//! Deployments API client

use openapi_models::{CreateDeploymentRequest, CreateDeploymentResponse, Deployment, LogsResponse};

use crate::errors::DeckError;
use crate::http::client::HttpClient;
use crate::http::LogsPage;

impl HttpClient {
    /// Create an app and its first deployment
    pub async fn create_deployment(
        &self,
        request: &CreateDeploymentRequest,
    ) -> Result<CreateDeploymentResponse, DeckError> {
        self.post("/deployments", Some(request)).await
    }

    pub async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment, DeckError> {
        self.get(&format!("/deployments/{}", deployment_id)).await
    }

    pub async fn cancel_deployment(&self, deployment_id: &str) -> Result<Deployment, DeckError> {
        self.post::<_, ()>(&format!("/deployments/{}/cancel", deployment_id), None)
            .await
    }

    /// Start a new deployment from a failed one
    pub async fn retry_deployment(&self, deployment_id: &str) -> Result<Deployment, DeckError> {
        self.post::<_, ()>(&format!("/deployments/{}/retry", deployment_id), None)
            .await
    }

    pub async fn get_deployment_logs(
        &self,
        deployment_id: &str,
        page: &LogsPage,
    ) -> Result<LogsResponse, DeckError> {
        self.get_with_query(&format!("/deployments/{}/logs", deployment_id), page)
            .await
    }
}
