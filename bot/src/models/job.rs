//! Queued job models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use platform_api::BuildRequest;

/// Work scheduled on the job queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Job {
    /// Re-run a stored command through the router
    ExecuteCommand { command_id: Uuid },

    /// Check on a submitted build and report when it finishes
    ReapDeployment { build: BuildRequest, attempt: u32 },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::ExecuteCommand { .. } => "execute_command",
            Job::ReapDeployment { .. } => "reap_deployment",
        }
    }
}
