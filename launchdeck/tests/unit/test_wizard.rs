//! Wizard draft and draft store tests

use launchdeck::errors::DeckError;
use launchdeck::filesys::dir::Dir;
use launchdeck::http::client::HttpClient;
use launchdeck::wizard::draft::{Draft, EnvVarField, WizardStep};
use launchdeck::wizard::store::{DraftStore, DRAFT_KEY};
use launchdeck::wizard::submit;
use openapi_models::{AppSource, Plan, SourceType};

fn complete_draft() -> Draft {
    let mut draft = Draft {
        source_type: Some(SourceType::DockerImage),
        docker_image: "nginx".to_string(),
        port: 80,
        ..Default::default()
    };
    draft.set_app_name("Demo");
    draft
}

#[test]
fn test_source_gate_tracks_image() {
    let mut draft = Draft {
        source_type: Some(SourceType::DockerImage),
        docker_image: String::new(),
        ..Default::default()
    };
    assert!(!draft.can_proceed(WizardStep::Source));

    draft.docker_image = "nginx".to_string();
    assert!(draft.can_proceed(WizardStep::Source));
}

#[test]
fn test_step_predicates() {
    let mut draft = Draft::default();
    assert!(!draft.can_proceed(WizardStep::Source));

    draft.source_type = Some(SourceType::Github);
    draft.repository = "acme/web".to_string();
    assert!(draft.can_proceed(WizardStep::Source));
    draft.branch.clear();
    assert!(!draft.can_proceed(WizardStep::Source));

    draft.port = 0;
    assert!(!draft.can_proceed(WizardStep::Build));
    draft.port = 65536;
    assert!(!draft.can_proceed(WizardStep::Build));
    draft.port = 65535;
    assert!(draft.can_proceed(WizardStep::Build));

    assert!(!draft.can_proceed(WizardStep::Configure));
    draft.app_name = "Web".to_string();
    draft.subdomain = "a".repeat(64);
    assert!(!draft.can_proceed(WizardStep::Configure));
    draft.subdomain = "a".repeat(63);
    assert!(draft.can_proceed(WizardStep::Configure));

    assert!(draft.can_proceed(WizardStep::Plan));
    draft.selected_plan = "enterprise".to_string();
    assert!(!draft.can_proceed(WizardStep::Plan));

    assert!(draft.can_proceed(WizardStep::Review));
}

#[test]
fn test_navigation_gate() {
    let mut draft = Draft::default();
    assert!(!draft.navigate_to(WizardStep::Build));
    assert!(!draft.next_step());
    assert_eq!(draft.current_step, WizardStep::Source);

    draft.source_type = Some(SourceType::DockerImage);
    draft.docker_image = "nginx".to_string();
    assert!(draft.next_step());
    assert_eq!(draft.current_step, WizardStep::Build);

    // Configure is incomplete, so review is out of reach
    assert!(!draft.navigate_to(WizardStep::Review));
    assert!(draft.navigate_to(WizardStep::Configure));

    draft.set_app_name("Demo");
    assert!(draft.navigate_to(WizardStep::Review));

    // Going back never needs anything
    draft.docker_image.clear();
    assert!(draft.navigate_to(WizardStep::Source));
    assert!(!draft.previous_step());
}

#[test]
fn test_to_request_mapping() {
    let mut draft = complete_draft();
    draft.docker_tag = "1.27".to_string();
    draft.build_command = "   ".to_string();
    draft.start_command = "nginx -g 'daemon off;'".to_string();
    draft.selected_plan = "pro".to_string();
    draft.add_env_var();
    draft.update_env_var(0, EnvVarField::Key, "MODE");
    draft.update_env_var(0, EnvVarField::Value, "prod");
    draft.add_env_var();
    draft.update_env_var(1, EnvVarField::Key, "EMPTY");
    draft.add_env_var();

    let request = draft.to_request().unwrap();
    assert_eq!(request.name, "Demo");
    assert_eq!(request.subdomain, "demo");
    assert_eq!(
        request.source,
        AppSource::DockerImage {
            image: "nginx".to_string(),
            tag: Some("1.27".to_string()),
        }
    );
    assert_eq!(request.plan, Plan::Pro);
    assert_eq!(request.port, Some(80));
    assert_eq!(request.build_command, None);
    assert_eq!(
        request.start_command.as_deref(),
        Some("nginx -g 'daemon off;'")
    );
    let env_vars = request.env_vars.unwrap();
    assert_eq!(env_vars.len(), 1);
    assert_eq!(env_vars[0].key, "MODE");
}

#[test]
fn test_dockerfile_source_keeps_path() {
    let draft = Draft {
        source_type: Some(SourceType::Dockerfile),
        repository: "acme/api".to_string(),
        ..Default::default()
    };
    assert_eq!(
        draft.source(),
        Some(AppSource::Dockerfile {
            repository: "acme/api".to_string(),
            branch: "main".to_string(),
            dockerfile_path: Some("Dockerfile".to_string()),
        })
    );
}

#[test]
fn test_to_request_without_source_type() {
    let draft = Draft::default();
    assert!(matches!(draft.to_request(), Err(DeckError::Precondition(_))));
}

#[tokio::test]
async fn test_store_resumes_draft() {
    let dir = tempfile::tempdir().unwrap();
    let store = DraftStore::new(&Dir::new(dir.path()));
    assert!(store
        .file()
        .path()
        .ends_with(format!("{}.json", DRAFT_KEY)));

    assert_eq!(store.load().await.unwrap(), Draft::default());

    let mut draft = complete_draft();
    draft.navigate_to(WizardStep::Configure);
    store.save(&draft).await.unwrap();

    let resumed = store.load().await.unwrap();
    assert_eq!(resumed, draft);
    assert_eq!(resumed.current_step, WizardStep::Configure);

    store.clear().await.unwrap();
    assert_eq!(store.load().await.unwrap(), Draft::default());
}

#[tokio::test]
async fn test_store_reports_corrupt_draft() {
    let dir = tempfile::tempdir().unwrap();
    let store = DraftStore::new(&Dir::new(dir.path()));
    tokio::fs::write(store.file().path(), b"{not json")
        .await
        .unwrap();

    assert!(matches!(
        store.load().await,
        Err(DeckError::StorageError(_))
    ));
}

#[tokio::test]
async fn test_store_fills_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = DraftStore::new(&Dir::new(dir.path()));
    tokio::fs::write(
        store.file().path(),
        br#"{"currentStep": "build", "sourceType": "github", "repository": "acme/web"}"#,
    )
    .await
    .unwrap();

    let draft = store.load().await.unwrap();
    assert_eq!(draft.current_step, WizardStep::Build);
    assert_eq!(draft.branch, "main");
    assert_eq!(draft.port, 3000);
    assert!(draft.can_proceed(WizardStep::Source));
}

#[tokio::test]
async fn test_submit_without_source_never_reaches_network() {
    let dir = tempfile::tempdir().unwrap();
    let store = DraftStore::new(&Dir::new(dir.path()));
    let draft = Draft::default();
    store.save(&draft).await.unwrap();

    // Nothing listens here; any request would fail with a transport error
    let client = HttpClient::new("http://127.0.0.1:9/v1").await.unwrap();
    let result = submit(&draft, &client, &store).await;

    assert!(matches!(result, Err(DeckError::Precondition(_))));
    assert!(store.file().exists().await);
}
