//! Polling observer
//!
//! Watches a deployment through the platform API and delivers what it sees on
//! a channel. The deployment is polled while it is in flight and polling stops
//! once a terminal state was delivered. Logs of a deployment or of a whole app
//! are polled until the watcher is shut down or its receiver goes away. A failed fetch is delivered as an
//! error and the loop carries on at its next tick.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use openapi_models::{Deployment, LogEntry, LogsResponse};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::DeckError;
use crate::http::client::HttpClient;
use crate::http::LogsPage;

/// Poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between deployment fetches while it is in flight
    pub deployment_interval: Duration,

    /// Interval between log fetches
    pub logs_interval: Duration,

    /// Page size requested per log fetch; the server default when unset
    pub logs_page_size: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            deployment_interval: Duration::from_secs(3),
            logs_interval: Duration::from_secs(5),
            logs_page_size: None,
        }
    }
}

/// Something observed by a watcher
#[derive(Debug)]
pub enum PollEvent {
    /// Latest state of the watched deployment
    Deployment(Deployment),

    /// Log lines that appeared since the previous delivery
    Logs(Vec<LogEntry>),

    /// A fetch failed; the watcher keeps its schedule
    Error(DeckError),
}

/// Whose logs a log watcher follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    Deployment(&'a str),
    /// Every deployment of the app, oldest first
    App(&'a str),
}

impl fmt::Display for LogTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTarget::Deployment(id) => write!(f, "deployment {}", id),
            LogTarget::App(id) => write!(f, "app {}", id),
        }
    }
}

/// Where watchers read deployment state from
#[async_trait]
pub trait DeploymentSource: Send + Sync {
    async fn fetch_deployment(&self, deployment_id: &str) -> Result<Deployment, DeckError>;

    async fn fetch_logs(
        &self,
        target: LogTarget<'_>,
        page: &LogsPage,
    ) -> Result<LogsResponse, DeckError>;
}

#[async_trait]
impl DeploymentSource for HttpClient {
    async fn fetch_deployment(&self, deployment_id: &str) -> Result<Deployment, DeckError> {
        self.get_deployment(deployment_id).await
    }

    async fn fetch_logs(
        &self,
        target: LogTarget<'_>,
        page: &LogsPage,
    ) -> Result<LogsResponse, DeckError> {
        match target {
            LogTarget::Deployment(deployment_id) => {
                self.get_deployment_logs(deployment_id, page).await
            }
            LogTarget::App(app_id) => self.get_app_logs(app_id, page).await,
        }
    }
}

/// Watch a deployment until it reaches a terminal state.
///
/// Returns the terminal deployment, or `None` when the watcher was shut down
/// or its receiver dropped first.
pub async fn watch_deployment<S, F>(
    options: &Options,
    source: &dyn DeploymentSource,
    deployment_id: &str,
    tx: mpsc::Sender<PollEvent>,
    sleep_fn: S,
    mut shutdown_signal: BoxFuture<'static, ()>,
) -> Option<Deployment>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    debug!("Watching deployment {}", deployment_id);

    loop {
        let event = match source.fetch_deployment(deployment_id).await {
            Ok(deployment) if deployment.status.is_terminal() => {
                info!(
                    "Deployment {} reached {}, polling stopped",
                    deployment_id, deployment.status
                );
                let _ = tx.send(PollEvent::Deployment(deployment.clone())).await;
                return Some(deployment);
            }
            Ok(deployment) => PollEvent::Deployment(deployment),
            Err(e) => {
                warn!("Fetching deployment {} failed: {}", deployment_id, e);
                PollEvent::Error(e)
            }
        };

        if tx.send(event).await.is_err() {
            debug!("Deployment watcher for {} has no receiver", deployment_id);
            return None;
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                debug!("Deployment watcher for {} shutting down", deployment_id);
                return None;
            }
            _ = sleep_fn(options.deployment_interval) => {}
        }
    }
}

/// Follow the logs of a deployment or app until shut down or the receiver drops.
///
/// Each tick resumes from the cursor returned by the previous page, so only
/// new lines are delivered. A truncated page is followed up immediately.
pub async fn watch_logs<S, F>(
    options: &Options,
    source: &dyn DeploymentSource,
    target: LogTarget<'_>,
    tx: mpsc::Sender<PollEvent>,
    sleep_fn: S,
    mut shutdown_signal: BoxFuture<'static, ()>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    debug!("Following logs of {}", target);
    let mut page = LogsPage {
        cursor: None,
        limit: options.logs_page_size,
    };

    loop {
        loop {
            let (event, more) = match source.fetch_logs(target, &page).await {
                Ok(response) => {
                    if response.cursor.is_some() {
                        page.cursor = response.cursor;
                    }
                    if response.logs.is_empty() {
                        break;
                    }
                    (PollEvent::Logs(response.logs), response.has_more)
                }
                Err(e) => {
                    warn!("Fetching logs of {} failed: {}", target, e);
                    (PollEvent::Error(e), false)
                }
            };

            if tx.send(event).await.is_err() {
                debug!("Log watcher for {} has no receiver", target);
                return;
            }
            if !more {
                break;
            }
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                debug!("Log watcher for {} shutting down", target);
                return;
            }
            _ = sleep_fn(options.logs_interval) => {}
        }
    }
}
