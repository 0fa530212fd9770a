//! Launchdeck API models
//!
//! Shapes exchanged between the platform backend and its clients, plus the
//! validation rules both sides apply before trusting a payload.

pub mod models;
pub mod requests;
pub mod validate;

pub use models::{
    App, AppSource, AppStatus, Deployment, DeploymentStatus, DeploymentStep, EnvVar, LogEntry,
    LogSeverity, Plan, SourceType, StepStatus,
};
pub use requests::{
    AppsListResponse, CreateDeploymentRequest, CreateDeploymentResponse, DeploymentsListResponse,
    ErrorBody, HealthResponse, LogsResponse, SubdomainCheckResponse, UpdateAppRequest,
    VersionResponse,
};
pub use validate::{Validate, ValidationError};
