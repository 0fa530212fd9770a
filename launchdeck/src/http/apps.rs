//! Apps API client

use openapi_models::{
    App, AppsListResponse, Deployment, DeploymentsListResponse, LogsResponse, UpdateAppRequest,
};

use crate::errors::DeckError;
use crate::http::client::HttpClient;
use crate::http::LogsPage;

impl HttpClient {
    pub async fn list_apps(&self) -> Result<AppsListResponse, DeckError> {
        self.get("/apps").await
    }

    pub async fn get_app(&self, app_id: &str) -> Result<App, DeckError> {
        self.get(&format!("/apps/{}", app_id)).await
    }

    /// Update app settings; omitted fields are left unchanged
    pub async fn update_app(&self, app_id: &str, update: &UpdateAppRequest) -> Result<App, DeckError> {
        self.patch(&format!("/apps/{}", app_id), update).await
    }

    pub async fn delete_app(&self, app_id: &str) -> Result<(), DeckError> {
        self.delete(&format!("/apps/{}", app_id)).await
    }

    /// Deploy the app's current source again
    pub async fn redeploy(&self, app_id: &str) -> Result<Deployment, DeckError> {
        self.post::<_, ()>(&format!("/apps/{}/redeploy", app_id), None)
            .await
    }

    pub async fn list_app_deployments(
        &self,
        app_id: &str,
    ) -> Result<DeploymentsListResponse, DeckError> {
        self.get(&format!("/apps/{}/deployments", app_id)).await
    }

    pub async fn get_app_logs(&self, app_id: &str, page: &LogsPage) -> Result<LogsResponse, DeckError> {
        self.get_with_query(&format!("/apps/{}/logs", app_id), page)
            .await
    }
}
