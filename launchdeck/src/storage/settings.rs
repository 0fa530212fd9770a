//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deploy::pipeline::{STEP_DWELL_MS, STEP_NAMES};
use crate::errors::DeckError;
use crate::logs::LogLevel;

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// REST server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Apps are served at `https://<subdomain>.<platform_domain>`
    #[serde(default = "default_platform_domain")]
    pub platform_domain: String,

    /// Deployment driver configuration
    #[serde(default)]
    pub simulator: SimulatorSettings,

    /// Page size used when a log request carries no limit
    #[serde(default = "default_logs_page_size")]
    pub logs_page_size: usize,
}

fn default_platform_domain() -> String {
    "ourplatform.io".to_string()
}

fn default_logs_page_size() -> usize {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_dir: None,
            server: ServerSettings::default(),
            platform_domain: default_platform_domain(),
            simulator: SimulatorSettings::default(),
            logs_page_size: default_logs_page_size(),
        }
    }
}

impl Settings {
    /// Reject values the service cannot run with
    pub fn check(&self) -> Result<(), DeckError> {
        if self.platform_domain.trim().is_empty() {
            return Err(DeckError::ConfigError(
                "platform_domain must not be empty".to_string(),
            ));
        }
        if self.logs_page_size == 0 {
            return Err(DeckError::ConfigError(
                "logs_page_size must be at least 1".to_string(),
            ));
        }
        if self.simulator.step_dwell_ms.len() != STEP_NAMES.len() {
            return Err(DeckError::ConfigError(format!(
                "simulator.step_dwell_ms needs {} entries, got {}",
                STEP_NAMES.len(),
                self.simulator.step_dwell_ms.len()
            )));
        }
        Ok(())
    }
}

/// REST server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Deployment driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorSettings {
    /// Dwell time of each pipeline step in milliseconds, in step order
    #[serde(default = "default_step_dwell_ms")]
    pub step_dwell_ms: Vec<u64>,
}

fn default_step_dwell_ms() -> Vec<u64> {
    STEP_DWELL_MS.to_vec()
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            step_dwell_ms: default_step_dwell_ms(),
        }
    }
}

impl SimulatorSettings {
    pub fn dwell_schedule(&self) -> Vec<Duration> {
        self.step_dwell_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }
}
