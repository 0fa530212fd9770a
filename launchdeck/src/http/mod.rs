//! Platform API client

pub mod apps;
pub mod client;
pub mod deployments;
pub mod subdomains;

use serde::Serialize;

/// Query parameters of a log page request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogsPage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}
