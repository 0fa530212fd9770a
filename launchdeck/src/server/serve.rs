//! HTTP server setup

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DeckError;
use crate::server::handlers::{
    app_deployments_handler, app_logs_handler, cancel_deployment_handler,
    check_subdomain_handler, create_deployment_handler, delete_app_handler,
    deployment_logs_handler, get_app_handler, get_deployment_handler, health_handler,
    list_apps_handler, redeploy_handler, retry_deployment_handler, update_app_handler,
    version_handler,
};
use crate::server::state::ServerState;

/// Build the API router
pub fn router(state: Arc<ServerState>) -> Router {
    let api = Router::new()
        // Apps
        .route("/apps", get(list_apps_handler))
        .route(
            "/apps/{app_id}",
            get(get_app_handler)
                .patch(update_app_handler)
                .delete(delete_app_handler),
        )
        .route("/apps/{app_id}/redeploy", post(redeploy_handler))
        .route("/apps/{app_id}/deployments", get(app_deployments_handler))
        .route("/apps/{app_id}/logs", get(app_logs_handler))
        // Deployments
        .route("/deployments", post(create_deployment_handler))
        .route("/deployments/{deployment_id}", get(get_deployment_handler))
        .route(
            "/deployments/{deployment_id}/cancel",
            post(cancel_deployment_handler),
        )
        .route(
            "/deployments/{deployment_id}/retry",
            post(retry_deployment_handler),
        )
        .route(
            "/deployments/{deployment_id}/logs",
            get(deployment_logs_handler),
        )
        // Subdomains
        .route("/subdomains/check", get(check_subdomain_handler));

    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .nest("/v1", api)
        // State and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server. Returns the bound address and the server task.
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, JoinHandle<Result<(), DeckError>>), DeckError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DeckError::ServerError(format!("bind {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| DeckError::ServerError(e.to_string()))?;
    info!("HTTP server listening on {}", local_addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DeckError::ServerError(e.to_string()))
    });

    Ok((local_addr, handle))
}
