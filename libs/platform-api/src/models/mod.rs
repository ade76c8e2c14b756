//! Platform API models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deployable unit inside a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub environment: String,
}

/// Source repository a pipeline deploys from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// `owner/name`
    pub name_with_owner: String,
    pub default_branch: String,
}

/// Named grouping of applications across environments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,

    /// Environment (stage) name to the applications deployed in it
    #[serde(default)]
    pub environments: BTreeMap<String, Vec<Application>>,

    pub default_environment: String,

    /// Absent when the pipeline is not connected to source hosting
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
}

impl Pipeline {
    /// Environment names in sorted order
    pub fn environment_names(&self) -> Vec<&str> {
        self.environments.keys().map(String::as_str).collect()
    }

    /// Applications of one stage
    pub fn applications(&self, environment: &str) -> Option<&[Application]> {
        self.environments.get(environment).map(Vec::as_slice)
    }
}

/// Notification routing attached to a build so the platform can report back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyPayload {
    pub room: String,
    pub user: String,
    pub team_id: String,
    pub user_name: String,
}

/// Body of an atomic lock-and-build submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitBuildRequest {
    pub application_id: String,
    pub application_name: String,
    pub repository: String,
    pub branch: String,
    pub environment: String,
    pub forced: bool,
    pub second_factor: bool,
    pub notify: NotifyPayload,
}

/// One deployment attempt accepted by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub id: String,
    pub application_id: String,
    pub application_name: String,

    /// Set by the dispatcher after the platform accepts the build
    #[serde(default)]
    pub command_id: Option<Uuid>,

    pub sha: String,
    pub branch: String,
    pub environment: String,
    pub forced: bool,
    pub dashboard_url: String,
    pub repository: String,
}

impl BuildRequest {
    /// Commit SHA shortened for display
    pub fn short_sha(&self) -> &str {
        let end = self
            .sha
            .char_indices()
            .nth(7)
            .map(|(idx, _)| idx)
            .unwrap_or(self.sha.len());
        &self.sha[..end]
    }
}

/// Progress of a submitted build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Succeeded { target_url: String },
    Failed { target_url: String },
}

impl BuildStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, BuildStatus::Pending)
    }
}

/// Author of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseUser {
    pub email: String,
}

/// Release record of an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: u64,
    pub description: String,
    pub user: ReleaseUser,
    pub created_at: DateTime<Utc>,
}

/// Error body returned by the platform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
