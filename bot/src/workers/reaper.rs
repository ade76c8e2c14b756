//! Deployment reaper
//!
//! Follows a submitted build until it finishes and reports the outcome to
//! the channel the deploy came from.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use platform_api::BuildRequest;

use crate::errors::DispatchError;
use crate::format::response::deployment_complete_message;
use crate::models::job::Job;
use crate::notify::ChatNotifier;
use crate::platform::DeploymentPlatform;
use crate::queue::JobQueue;
use crate::storage::commands::CommandStore;

/// Reaper options
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay between status checks of a pending build
    pub interval: Duration,

    /// Checks before a pending build is abandoned
    pub max_attempts: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 30,
        }
    }
}

/// What one reaper pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// Still pending, checked again later
    Requeued,
    /// Still pending after the last allowed check
    GaveUp,
    /// Finished and reported to chat
    Reported,
    /// Finished, but no command to report to
    Unreported,
}

pub struct Reaper {
    options: Options,
    store: Arc<dyn CommandStore>,
    platform: Arc<dyn DeploymentPlatform>,
    queue: Arc<dyn JobQueue>,
    notifier: Arc<dyn ChatNotifier>,
}

impl Reaper {
    pub fn new(
        options: Options,
        store: Arc<dyn CommandStore>,
        platform: Arc<dyn DeploymentPlatform>,
        queue: Arc<dyn JobQueue>,
        notifier: Arc<dyn ChatNotifier>,
    ) -> Self {
        Self {
            options,
            store,
            platform,
            queue,
            notifier,
        }
    }

    /// Check `build` once; `attempt` counts from zero
    pub async fn reap(&self, build: &BuildRequest, attempt: u32) -> Result<ReapOutcome, DispatchError> {
        let status = self.platform.build_status(build).await?;

        if !status.is_finished() {
            let next = attempt + 1;
            if next >= self.options.max_attempts {
                warn!(
                    "Build {} for {} still pending after {} checks, giving up",
                    build.id, build.application_name, next
                );
                return Ok(ReapOutcome::GaveUp);
            }

            debug!("Build {} pending (check {})", build.id, next);
            self.queue
                .enqueue(
                    Job::ReapDeployment {
                        build: build.clone(),
                        attempt: next,
                    },
                    self.options.interval,
                )
                .await?;
            return Ok(ReapOutcome::Requeued);
        }

        let command = match build.command_id {
            Some(id) => self.store.find(id).await?,
            None => None,
        };
        let Some(command) = command else {
            info!("Build {} finished with no command to report to", build.id);
            return Ok(ReapOutcome::Unreported);
        };

        let Some(response) = deployment_complete_message(
            build,
            &status,
            &command.user.slack_user_id,
            command.age(Utc::now()),
        ) else {
            return Ok(ReapOutcome::Unreported);
        };

        info!("Build {} finished: {:?}", build.id, status);
        self.notifier.post(&command, &response).await?;
        Ok(ReapOutcome::Reported)
    }
}
