//! Error types for deploybot

use thiserror::Error;

/// Main error type for command dispatch
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unable to parse command: {0}")]
    Parse(String),

    #[error("Unable to find a pipeline called {0}")]
    PipelineNotFound(String),

    #[error("Unable to find an environment called {environment}. Available environments: {}", .available.join(", "))]
    EnvironmentNotFound {
        environment: String,
        available: Vec<String>,
    },

    #[error("There is more than one app in the {pipeline} {environment} stage: {}. This is not supported yet.", .applications.join(", "))]
    AmbiguousApplication {
        pipeline: String,
        environment: String,
        applications: Vec<String>,
    },

    #[error("Unable to find {} in the {pipeline} {environment} stage", describe_application(.application))]
    ApplicationNotFound {
        pipeline: String,
        environment: String,
        application: Option<String>,
    },

    #[error("Someone is already deploying to {0}")]
    Locked(String),

    #[error("Unable to create GitHub deployments for {repository}: {reason}")]
    Conflict { repository: String, reason: String },

    #[error("{0} requires a second factor for access")]
    TwoFactorRequired(String),

    #[error("Pipeline {0} is not connected to GitHub")]
    RepositoryNotConnected(String),

    #[error("GitHub account is not connected")]
    GithubNotConnected,

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue error: {0}")]
    QueueError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Errors that always end as a formatted reply to the requester.
    ///
    /// Everything else is unexpected: reported to the error sink, or
    /// propagated when running in strict mode.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            DispatchError::Parse(_)
                | DispatchError::PipelineNotFound(_)
                | DispatchError::EnvironmentNotFound { .. }
                | DispatchError::AmbiguousApplication { .. }
                | DispatchError::ApplicationNotFound { .. }
                | DispatchError::Locked(_)
                | DispatchError::Conflict { .. }
                | DispatchError::TwoFactorRequired(_)
                | DispatchError::RepositoryNotConnected(_)
                | DispatchError::GithubNotConnected
        )
    }
}

fn describe_application(application: &Option<String>) -> String {
    match application {
        Some(name) => format!("an app called {}", name),
        None => "an app".to_string(),
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        DispatchError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
