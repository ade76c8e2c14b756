//! Deployment platform integration
//!
//! The dispatcher never takes deploy locks itself. `submit` acquires the
//! per-application lock and creates the build in one call, so no window
//! exists between "lock free" and "build submitted".

pub mod http;
pub mod memory;

use async_trait::async_trait;

use platform_api::{BuildRequest, BuildStatus, Pipeline, Release, SubmitBuildRequest};

use crate::errors::DispatchError;

/// Operations the dispatcher needs from the deployment platform
#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    /// Current pipeline configuration
    async fn pipelines(&self) -> Result<Vec<Pipeline>, DispatchError>;

    /// Lock the application and submit a build, atomically.
    ///
    /// Fails with `Locked`, `Conflict`, `TwoFactorRequired` or a transient
    /// error.
    async fn submit(&self, request: SubmitBuildRequest) -> Result<BuildRequest, DispatchError>;

    async fn build_status(&self, build: &BuildRequest) -> Result<BuildStatus, DispatchError>;

    async fn releases(&self, application: &str) -> Result<Vec<Release>, DispatchError>;

    async fn release_info(&self, application: &str, version: u64)
        -> Result<Release, DispatchError>;
}
