//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use http::StatusCode;
use openapi_models::{
    App, AppsListResponse, CreateDeploymentRequest, CreateDeploymentResponse, Deployment,
    DeploymentsListResponse, HealthResponse, LogsResponse, SubdomainCheckResponse,
    UpdateAppRequest, VersionResponse,
};
use serde::Deserialize;

use crate::server::errors::ApiError;
use crate::server::state::ServerState;
use crate::utils::version_info;

type ApiResult<T> = Result<T, ApiError>;

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "launchdeck".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
        profile: version.profile,
    })
}

/// Log paging parameters
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SubdomainQuery {
    pub name: String,
}

// ================================== APPS ======================================== //

pub async fn list_apps_handler(State(state): State<Arc<ServerState>>) -> Json<AppsListResponse> {
    Json(state.platform.list_apps())
}

pub async fn get_app_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> ApiResult<Json<App>> {
    Ok(Json(state.platform.get_app(&app_id)?))
}

pub async fn update_app_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    body: Result<Json<UpdateAppRequest>, JsonRejection>,
) -> ApiResult<Json<App>> {
    let Json(update) = body.map_err(ApiError::from_json_rejection)?;
    Ok(Json(state.platform.update_app(&app_id, update)?))
}

pub async fn delete_app_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.platform.delete_app(&app_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn redeploy_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> ApiResult<Json<Deployment>> {
    Ok(Json(state.platform.redeploy(&app_id)?))
}

pub async fn app_deployments_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> ApiResult<Json<DeploymentsListResponse>> {
    Ok(Json(state.platform.list_app_deployments(&app_id)?))
}

pub async fn app_logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> ApiResult<Json<LogsResponse>> {
    let Query(query) = query.map_err(ApiError::from_query_rejection)?;
    Ok(Json(state.platform.app_logs(
        &app_id,
        query.cursor.as_deref(),
        query.limit,
    )?))
}

// =============================== DEPLOYMENTS ==================================== //

pub async fn create_deployment_handler(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<CreateDeploymentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateDeploymentResponse>)> {
    let Json(request) = body.map_err(ApiError::from_json_rejection)?;
    let created = state.platform.create_deployment(request)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
) -> ApiResult<Json<Deployment>> {
    Ok(Json(state.platform.get_deployment(&deployment_id)?))
}

pub async fn cancel_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
) -> ApiResult<Json<Deployment>> {
    Ok(Json(state.platform.cancel_deployment(&deployment_id)?))
}

pub async fn retry_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
) -> ApiResult<(StatusCode, Json<Deployment>)> {
    let deployment = state.platform.retry_deployment(&deployment_id)?;
    Ok((StatusCode::CREATED, Json(deployment)))
}

pub async fn deployment_logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> ApiResult<Json<LogsResponse>> {
    let Query(query) = query.map_err(ApiError::from_query_rejection)?;
    Ok(Json(state.platform.deployment_logs(
        &deployment_id,
        query.cursor.as_deref(),
        query.limit,
    )?))
}

// ================================ SUBDOMAINS ==================================== //

pub async fn check_subdomain_handler(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<SubdomainQuery>, QueryRejection>,
) -> ApiResult<Json<SubdomainCheckResponse>> {
    let Query(query) = query.map_err(ApiError::from_query_rejection)?;
    Ok(Json(state.platform.check_subdomain(&query.name)?))
}
