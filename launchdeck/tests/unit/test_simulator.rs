//! Deployment driver tests, run on a paused clock

use std::sync::Arc;
use std::time::Duration;

use launchdeck::app::options::AppOptions;
use launchdeck::app::state::AppState;
use launchdeck::deploy::probe::FailAtStep;
use openapi_models::{
    AppSource, AppStatus, CreateDeploymentRequest, CreateDeploymentResponse, DeploymentStatus,
    LogSeverity, Plan, StepStatus, Validate,
};

fn demo_request() -> CreateDeploymentRequest {
    CreateDeploymentRequest {
        name: "Demo".to_string(),
        subdomain: "demo".to_string(),
        source: AppSource::DockerImage {
            image: "nginx".to_string(),
            tag: Some("latest".to_string()),
        },
        plan: Plan::Starter,
        env_vars: None,
        build_command: None,
        start_command: None,
        port: Some(80),
    }
}

fn create(state: &AppState) -> CreateDeploymentResponse {
    state.platform.create_deployment(demo_request()).unwrap()
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_runs_through_every_step() {
    let state = AppState::init(&AppOptions::default());
    let created = create(&state);
    let id = created.deployment.id.clone();

    sleep_ms(1000).await;
    let deployment = state.platform.get_deployment(&id).unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Queued);
    assert_eq!(deployment.steps[0].status, StepStatus::Running);

    // First step dwells 2s
    sleep_ms(1500).await;
    let deployment = state.platform.get_deployment(&id).unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Running);
    assert!(deployment.started_at.is_some());
    assert_eq!(deployment.running_step(), Some(1));

    // Second step dwells 3s
    sleep_ms(2000).await;
    assert_eq!(
        state.platform.get_deployment(&id).unwrap().running_step(),
        Some(1)
    );
    sleep_ms(1000).await;
    assert_eq!(
        state.platform.get_deployment(&id).unwrap().running_step(),
        Some(2)
    );

    sleep_ms(20_000).await;
    let deployment = state.platform.get_deployment(&id).unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Succeeded);
    assert!(deployment.validate().is_ok());
    assert!(!state.simulator.is_driving(&id));

    let app = state.platform.get_app(&created.app.id).unwrap();
    assert_eq!(app.status, AppStatus::Live);
    assert_eq!(app.url.as_deref(), Some("https://demo.ourplatform.io"));
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_fails_the_step() {
    let state = AppState::with_probe(
        &AppOptions::default(),
        Arc::new(FailAtStep::new(4, "manifest for nginx:latest not found")),
    );
    let created = create(&state);
    let id = created.deployment.id.clone();

    sleep_ms(30_000).await;
    let deployment = state.platform.get_deployment(&id).unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
    assert_eq!(deployment.steps[4].status, StepStatus::Failed);
    assert_eq!(
        deployment.steps[4].error.as_deref(),
        Some("manifest for nginx:latest not found")
    );
    assert!(deployment.steps[5..]
        .iter()
        .all(|s| s.status == StepStatus::Skipped));
    assert!(!state.simulator.is_driving(&id));

    let app = state.platform.get_app(&created.app.id).unwrap();
    assert_eq!(app.status, AppStatus::Failed);
    assert_eq!(app.url, None);

    let logs = state.platform.deployment_logs(&id, None, None).unwrap();
    assert!(logs
        .logs
        .iter()
        .any(|l| l.level == LogSeverity::Error && l.message.starts_with("Pulling image failed")));
}

#[tokio::test(start_paused = true)]
async fn test_blank_failure_diagnostic_still_fails_the_step() {
    let state = AppState::with_probe(&AppOptions::default(), Arc::new(FailAtStep::new(2, "  ")));
    let created = create(&state);
    let id = created.deployment.id.clone();

    sleep_ms(30_000).await;
    let deployment = state.platform.get_deployment(&id).unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
    assert_eq!(deployment.steps[2].status, StepStatus::Failed);
    assert_eq!(
        deployment.steps[2].error.as_deref(),
        Some("Configuring routing did not complete")
    );
    assert!(deployment.steps[3..]
        .iter()
        .all(|s| s.status == StepStatus::Skipped));
    assert!(deployment.completed_at.is_some());
    assert!(!state.simulator.is_driving(&id));
    assert_eq!(
        state.platform.get_app(&created.app.id).unwrap().status,
        AppStatus::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_freezes_the_deployment() {
    let state = AppState::init(&AppOptions::default());
    let created = create(&state);
    let id = created.deployment.id.clone();

    sleep_ms(3000).await;
    let canceled = state.platform.cancel_deployment(&id).unwrap();
    assert_eq!(canceled.status, DeploymentStatus::Canceled);

    sleep_ms(60_000).await;
    let later = state.platform.get_deployment(&id).unwrap();
    assert_eq!(later, canceled);
    assert_eq!(state.simulator.active(), 0);
    assert_eq!(
        state.platform.get_app(&created.app.id).unwrap().status,
        AppStatus::Stopped
    );
}

#[tokio::test(start_paused = true)]
async fn test_redeploy_after_success() {
    let state = AppState::init(&AppOptions::default());
    let created = create(&state);

    sleep_ms(20_000).await;
    let redeployed = state.platform.redeploy(&created.app.id).unwrap();
    assert_eq!(redeployed.version, 2);
    assert_eq!(
        state.platform.get_app(&created.app.id).unwrap().status,
        AppStatus::Deploying
    );

    sleep_ms(20_000).await;
    let app = state.platform.get_app(&created.app.id).unwrap();
    assert_eq!(app.status, AppStatus::Live);
    assert_eq!(
        app.latest_deployment.map(|d| d.version),
        Some(2)
    );

    let logs = state
        .platform
        .app_logs(&created.app.id, None, Some(1000))
        .unwrap();
    assert_eq!(logs.logs[0].message, "Deployment v1 queued");
    assert!(logs
        .logs
        .iter()
        .any(|l| l.message == "Deployment v2 queued"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_all_drivers() {
    let state = AppState::init(&AppOptions::default());
    let created = create(&state);
    assert_eq!(state.simulator.active(), 1);

    state.shutdown();
    assert_eq!(state.simulator.active(), 0);

    sleep_ms(30_000).await;
    assert_eq!(
        state
            .platform
            .get_deployment(&created.deployment.id)
            .unwrap()
            .status,
        DeploymentStatus::Queued
    );
}
