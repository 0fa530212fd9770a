//! Platform service tests

use std::sync::Arc;
use std::time::Duration;

use launchdeck::deploy::fsm::DeploymentEvent;
use launchdeck::deploy::probe::AlwaysPass;
use launchdeck::errors::DeckError;
use launchdeck::services::ledger::Ledger;
use launchdeck::services::platform::PlatformService;
use launchdeck::workers::simulator::{self, Simulator};
use openapi_models::{
    AppSource, AppStatus, CreateDeploymentRequest, DeploymentStatus, EnvVar, Plan,
    UpdateAppRequest, Validate,
};

/// Service whose driver never gets to advance a step during a test
fn idle_platform() -> PlatformService {
    let ledger = Arc::new(Ledger::new("ourplatform.io"));
    let simulator = Arc::new(Simulator::new(
        ledger.clone(),
        simulator::Options {
            schedule: vec![Duration::from_secs(3600); 8],
            probe: Arc::new(AlwaysPass),
        },
    ));
    PlatformService::new(ledger, simulator, 100)
}

fn request(name: &str, subdomain: &str) -> CreateDeploymentRequest {
    CreateDeploymentRequest {
        name: name.to_string(),
        subdomain: subdomain.to_string(),
        source: AppSource::Github {
            repository: "acme/api".to_string(),
            branch: "main".to_string(),
        },
        plan: Plan::Standard,
        env_vars: Some(vec![EnvVar {
            key: "RUST_LOG".to_string(),
            value: "info".to_string(),
        }]),
        build_command: Some("cargo build --release".to_string()),
        start_command: Some("".to_string()),
        port: None,
    }
}

fn fail(platform: &PlatformService, deployment_id: &str) {
    platform
        .ledger()
        .apply(deployment_id, DeploymentEvent::Fail("build exited with 101".to_string()))
        .unwrap();
}

#[tokio::test]
async fn test_create_deployment() {
    let platform = idle_platform();
    let created = platform.create_deployment(request("API", "api")).unwrap();

    assert!(created.validate().is_ok());
    assert_eq!(created.app.status, AppStatus::Deploying);
    assert_eq!(created.app.port, 3000);
    assert_eq!(created.app.start_command, None);
    assert_eq!(created.deployment.status, DeploymentStatus::Queued);
    assert_eq!(created.deployment.version, 1);
    assert!(platform.simulator().is_driving(&created.deployment.id));

    let listed = platform.list_apps();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.apps[0].id, created.app.id);
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let platform = idle_platform();

    let mut bad_port = request("API", "api");
    bad_port.port = Some(70000);
    assert!(matches!(
        platform.create_deployment(bad_port),
        Err(DeckError::ValidationError(_))
    ));

    let bad_subdomain = request("API", "-api");
    assert!(matches!(
        platform.create_deployment(bad_subdomain),
        Err(DeckError::ValidationError(_))
    ));

    assert_eq!(platform.list_apps().total, 0);
}

#[tokio::test]
async fn test_subdomain_uniqueness() {
    let platform = idle_platform();
    platform.create_deployment(request("API", "api")).unwrap();

    let check = platform.check_subdomain("api").unwrap();
    assert!(!check.available);
    assert_eq!(check.suggestion.as_deref(), Some("api-2"));

    let check = platform.check_subdomain("api-2").unwrap();
    assert!(check.available);
    assert_eq!(check.suggestion, None);

    match platform.create_deployment(request("API again", "api")) {
        Err(DeckError::Conflict { suggestion, .. }) => {
            assert_eq!(suggestion.as_deref(), Some("api-2"))
        }
        other => panic!("expected a conflict, got {:?}", other),
    }

    platform.create_deployment(request("API 2", "api-2")).unwrap();
    let check = platform.check_subdomain("api").unwrap();
    assert_eq!(check.suggestion.as_deref(), Some("api-3"));

    assert!(matches!(
        platform.check_subdomain("Not Valid"),
        Err(DeckError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_versions_increase_across_retries() {
    let platform = idle_platform();
    let created = platform.create_deployment(request("API", "api")).unwrap();
    let first = created.deployment;

    fail(&platform, &first.id);
    assert_eq!(
        platform.get_app(&created.app.id).unwrap().status,
        AppStatus::Failed
    );

    let second = platform.retry_deployment(&first.id).unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(second.source, first.source);
    assert_eq!(
        platform.get_app(&created.app.id).unwrap().status,
        AppStatus::Deploying
    );

    fail(&platform, &second.id);
    // An older failed deployment can be retried once nothing is in flight
    let third = platform.retry_deployment(&first.id).unwrap();
    assert_eq!(third.version, 3);

    let history = platform.list_app_deployments(&created.app.id).unwrap();
    let versions: Vec<u32> = history.deployments.iter().map(|d| d.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);

    // Earlier deployments stay untouched
    assert_eq!(
        platform.get_deployment(&first.id).unwrap().status,
        DeploymentStatus::Failed
    );
}

#[tokio::test]
async fn test_retry_requires_failed_deployment() {
    let platform = idle_platform();
    let created = platform.create_deployment(request("API", "api")).unwrap();
    let deployment_id = created.deployment.id;

    // queued
    assert!(matches!(
        platform.retry_deployment(&deployment_id),
        Err(DeckError::IllegalTransition(_))
    ));

    // running
    platform
        .ledger()
        .apply(&deployment_id, DeploymentEvent::Advance)
        .unwrap();
    assert!(matches!(
        platform.retry_deployment(&deployment_id),
        Err(DeckError::IllegalTransition(_))
    ));

    // canceled
    platform.cancel_deployment(&deployment_id).unwrap();
    assert!(matches!(
        platform.retry_deployment(&deployment_id),
        Err(DeckError::IllegalTransition(_))
    ));

    assert!(matches!(
        platform.retry_deployment("deploy-missing"),
        Err(DeckError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_retry_rejected_while_another_is_in_flight() {
    let platform = idle_platform();
    let created = platform.create_deployment(request("API", "api")).unwrap();
    fail(&platform, &created.deployment.id);

    platform.retry_deployment(&created.deployment.id).unwrap();
    assert!(matches!(
        platform.retry_deployment(&created.deployment.id),
        Err(DeckError::IllegalTransition(_))
    ));
}

#[tokio::test]
async fn test_cancel_stops_driver() {
    let platform = idle_platform();
    let created = platform.create_deployment(request("API", "api")).unwrap();
    let deployment_id = created.deployment.id;

    let canceled = platform.cancel_deployment(&deployment_id).unwrap();
    assert_eq!(canceled.status, DeploymentStatus::Canceled);
    assert!(!platform.simulator().is_driving(&deployment_id));
    assert_eq!(
        platform.get_app(&created.app.id).unwrap().status,
        AppStatus::Stopped
    );

    assert!(matches!(
        platform.cancel_deployment(&deployment_id),
        Err(DeckError::IllegalTransition(_))
    ));
}

#[tokio::test]
async fn test_update_and_delete_app() {
    let platform = idle_platform();
    let created = platform.create_deployment(request("API", "api")).unwrap();
    let app_id = created.app.id;

    let updated = platform
        .update_app(
            &app_id,
            UpdateAppRequest {
                name: Some("Public API".to_string()),
                port: Some(8080),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Public API");
    assert_eq!(updated.port, 8080);
    assert_eq!(updated.subdomain, "api");

    assert!(matches!(
        platform.update_app(
            &app_id,
            UpdateAppRequest {
                port: Some(0),
                ..Default::default()
            },
        ),
        Err(DeckError::ValidationError(_))
    ));

    platform.delete_app(&app_id).unwrap();
    assert!(!platform.simulator().is_driving(&created.deployment.id));
    assert!(matches!(platform.get_app(&app_id), Err(DeckError::NotFound(_))));
    assert!(matches!(
        platform.list_app_deployments(&app_id),
        Err(DeckError::NotFound(_))
    ));
    assert!(platform.check_subdomain("api").unwrap().available);
    assert_eq!(
        platform.get_deployment(&created.deployment.id).unwrap().status,
        DeploymentStatus::Canceled
    );
}

#[tokio::test]
async fn test_log_limits() {
    let platform = idle_platform();
    let created = platform.create_deployment(request("API", "api")).unwrap();

    let page = platform
        .deployment_logs(&created.deployment.id, None, None)
        .unwrap();
    assert_eq!(page.logs.len(), 1);
    assert_eq!(page.cursor.as_deref(), Some("1"));
    assert!(!page.has_more);

    let next = platform
        .deployment_logs(&created.deployment.id, page.cursor.as_deref(), Some(10))
        .unwrap();
    assert!(next.logs.is_empty());
    assert_eq!(next.cursor.as_deref(), Some("1"));

    assert!(matches!(
        platform.app_logs(&created.app.id, None, Some(0)),
        Err(DeckError::ValidationError(_))
    ));
}
