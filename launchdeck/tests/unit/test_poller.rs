//! Polling observer tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use launchdeck::deploy::fsm::{process, DeploymentEvent};
use launchdeck::deploy::pipeline::new_deployment;
use launchdeck::errors::DeckError;
use launchdeck::http::LogsPage;
use launchdeck::workers::poller::{self, DeploymentSource, LogTarget, PollEvent};
use openapi_models::{
    AppSource, Deployment, DeploymentStatus, LogEntry, LogSeverity, LogsResponse,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_test::assert_ok;

/// Replays scripted responses and records what was asked
#[derive(Default)]
struct ScriptedSource {
    deployments: Mutex<VecDeque<Result<Deployment, DeckError>>>,
    logs: Mutex<VecDeque<Result<LogsResponse, DeckError>>>,
    deployment_calls: Mutex<Vec<Instant>>,
    log_cursors: Mutex<Vec<Option<String>>>,
    log_fetches: Mutex<Vec<(String, Instant)>>,
}

#[async_trait]
impl DeploymentSource for ScriptedSource {
    async fn fetch_deployment(&self, _deployment_id: &str) -> Result<Deployment, DeckError> {
        self.deployment_calls.lock().unwrap().push(Instant::now());
        self.deployments
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DeckError::Internal("script exhausted".to_string())))
    }

    async fn fetch_logs(
        &self,
        target: LogTarget<'_>,
        page: &LogsPage,
    ) -> Result<LogsResponse, DeckError> {
        self.log_fetches
            .lock()
            .unwrap()
            .push((target.to_string(), Instant::now()));
        self.log_cursors.lock().unwrap().push(page.cursor.clone());
        self.logs.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(LogsResponse {
                logs: vec![],
                cursor: page.cursor.clone(),
                has_more: false,
            })
        })
    }
}

fn deployment_after(advances: usize) -> Deployment {
    let mut deployment = new_deployment(
        "app-1",
        1,
        AppSource::DockerImage {
            image: "nginx".to_string(),
            tag: None,
        },
        Utc::now(),
    );
    for _ in 0..advances {
        process(&mut deployment, DeploymentEvent::Advance, Utc::now()).unwrap();
    }
    deployment
}

fn entry(message: &str) -> LogEntry {
    LogEntry {
        timestamp: Utc::now(),
        level: LogSeverity::Info,
        message: message.to_string(),
        source: None,
    }
}

fn never() -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(std::future::pending())
}

#[tokio::test(start_paused = true)]
async fn test_deployment_polling_stops_at_terminal_state() {
    let source = ScriptedSource::default();
    {
        let mut script = source.deployments.lock().unwrap();
        script.push_back(Ok(deployment_after(0)));
        script.push_back(Ok(deployment_after(3)));
        script.push_back(Ok(deployment_after(8)));
    }
    let (tx, mut rx) = mpsc::channel(16);

    let start = Instant::now();
    let last = poller::watch_deployment(
        &poller::Options::default(),
        &source,
        "deploy-1",
        tx,
        tokio::time::sleep,
        never(),
    )
    .await;

    let last = last.expect("terminal deployment");
    assert_eq!(last.status, DeploymentStatus::Succeeded);

    let calls = source.deployment_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    for (i, expected) in [(1, 3), (2, 6)] {
        let elapsed = calls[i] - start;
        assert!(elapsed >= Duration::from_secs(expected), "call {} at {:?}", i, elapsed);
        assert!(elapsed < Duration::from_secs(expected) + Duration::from_millis(50));
    }

    let mut statuses = Vec::new();
    while let Ok(PollEvent::Deployment(d)) = rx.try_recv() {
        statuses.push(d.status);
    }
    assert_eq!(
        statuses,
        vec![
            DeploymentStatus::Queued,
            DeploymentStatus::Running,
            DeploymentStatus::Succeeded
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_fetch_errors_are_surfaced_and_polling_continues() {
    let source = ScriptedSource::default();
    {
        let mut script = source.deployments.lock().unwrap();
        script.push_back(Ok(deployment_after(1)));
        script.push_back(Err(DeckError::SchemaMismatch(
            "GET /deployments/deploy-1: missing field `steps`".to_string(),
        )));
        script.push_back(Ok(deployment_after(8)));
    }
    let (tx, mut rx) = mpsc::channel(16);

    let last = poller::watch_deployment(
        &poller::Options::default(),
        &source,
        "deploy-1",
        tx,
        tokio::time::sleep,
        never(),
    )
    .await;
    assert!(last.is_some());

    assert!(matches!(rx.recv().await, Some(PollEvent::Deployment(_))));
    assert!(matches!(
        rx.recv().await,
        Some(PollEvent::Error(DeckError::SchemaMismatch(_)))
    ));
    assert!(matches!(rx.recv().await, Some(PollEvent::Deployment(d)) if d.status == DeploymentStatus::Succeeded));
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_deployment_polling_stops_when_receiver_drops() {
    let source = ScriptedSource::default();
    source
        .deployments
        .lock()
        .unwrap()
        .push_back(Ok(deployment_after(1)));
    let (tx, rx) = mpsc::channel(16);
    drop(rx);

    let last = poller::watch_deployment(
        &poller::Options::default(),
        &source,
        "deploy-1",
        tx,
        tokio::time::sleep,
        never(),
    )
    .await;
    assert!(last.is_none());
    assert_eq!(source.deployment_calls.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_log_polling_follows_cursor() {
    let source = ScriptedSource::default();
    {
        let mut script = source.logs.lock().unwrap();
        script.push_back(Ok(LogsResponse {
            logs: vec![entry("Deployment v1 queued"), entry("Queued completed")],
            cursor: Some("2".to_string()),
            has_more: true,
        }));
        script.push_back(Ok(LogsResponse {
            logs: vec![entry("Provisioning compute started")],
            cursor: Some("3".to_string()),
            has_more: false,
        }));
    }
    let (tx, mut rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let watcher = async {
        poller::watch_logs(
            &poller::Options::default(),
            &source,
            LogTarget::Deployment("deploy-1"),
            tx,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = stop_rx.await;
            }),
        )
        .await
    };
    let driver = async {
        // Two ticks at 0s and 5s, then stop
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_ok!(stop_tx.send(()));
    };
    tokio::join!(watcher, driver);

    let cursors = source.log_cursors.lock().unwrap().clone();
    assert_eq!(
        cursors,
        vec![None, Some("2".to_string()), Some("3".to_string())]
    );

    let mut messages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            PollEvent::Logs(logs) => messages.extend(logs.into_iter().map(|l| l.message)),
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert_eq!(
        messages,
        vec![
            "Deployment v1 queued",
            "Queued completed",
            "Provisioning compute started"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_app_log_polling_ticks_every_five_seconds() {
    let source = ScriptedSource::default();
    {
        let mut script = source.logs.lock().unwrap();
        script.push_back(Ok(LogsResponse {
            logs: vec![entry("Deployment v1 queued")],
            cursor: Some("1".to_string()),
            has_more: false,
        }));
        script.push_back(Err(DeckError::SchemaMismatch(
            "GET /apps/app-1/logs: missing field `logs`".to_string(),
        )));
        script.push_back(Ok(LogsResponse {
            logs: vec![entry("Deployment v2 queued")],
            cursor: Some("2".to_string()),
            has_more: false,
        }));
    }
    let (tx, mut rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let start = Instant::now();
    let watcher = async {
        poller::watch_logs(
            &poller::Options::default(),
            &source,
            LogTarget::App("app-1"),
            tx,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = stop_rx.await;
            }),
        )
        .await
    };
    let driver = async {
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_ok!(stop_tx.send(()));
    };
    tokio::join!(watcher, driver);

    let fetches = source.log_fetches.lock().unwrap().clone();
    assert_eq!(fetches.len(), 3);
    for (i, (target, at)) in fetches.iter().enumerate() {
        assert_eq!(target, "app app-1");
        let expected = Duration::from_secs(5 * i as u64);
        let elapsed = *at - start;
        assert!(elapsed >= expected, "fetch {} at {:?}", i, elapsed);
        assert!(elapsed < expected + Duration::from_millis(50));
    }
    // The failed fetch does not move the cursor
    assert_eq!(
        source.log_cursors.lock().unwrap().clone(),
        vec![None, Some("1".to_string()), Some("1".to_string())]
    );

    assert!(matches!(rx.recv().await, Some(PollEvent::Logs(l)) if l[0].message == "Deployment v1 queued"));
    assert!(matches!(rx.recv().await, Some(PollEvent::Error(DeckError::SchemaMismatch(_)))));
    assert!(matches!(rx.recv().await, Some(PollEvent::Logs(l)) if l[0].message == "Deployment v2 queued"));
    assert!(rx.recv().await.is_none());
}
