//! Deploy command execution
//!
//! One call to [`DeploymentOrchestrator::run`] is one attempt at a stored
//! command. Attempts that lose the lock hand the command to the
//! [`RetryScheduler`]; whichever attempt finishes first marks the command
//! processed and is the only one that replies.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use chat_api::Response;
use platform_api::{BuildRequest, NotifyPayload, SubmitBuildRequest};

use crate::commands::parser::{parse_deploy, DEPLOY_USAGE};
use crate::commands::resolver::resolve;
use crate::deploy::fsm::{DeployEvent, DeployFsm, DeployState};
use crate::deploy::retry::RetryScheduler;
use crate::errors::DispatchError;
use crate::format::response::{
    deploying_message, domain_error_response, error_response_for, help_response, response_for,
    Links,
};
use crate::models::command::Command;
use crate::models::job::Job;
use crate::platform::DeploymentPlatform;
use crate::queue::JobQueue;
use crate::reporting::ErrorSink;
use crate::storage::commands::CommandStore;

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Delay before a lock-contended command runs again
    pub retry_delay: Duration,

    /// Delay before the first reaper check of a submitted build
    pub reaper_delay: Duration,

    /// Propagate unexpected errors instead of reporting them
    pub strict_mode: bool,

    /// Reply "is deploying" on success instead of staying quiet
    pub announce_deploys: bool,

    pub links: Links,
}

/// Outcome of one attempt
#[derive(Debug, Clone)]
pub struct DeployExecution {
    pub state: DeployState,
    pub response: Response,
    pub build: Option<BuildRequest>,
}

/// Drives a deploy command from text to submitted build
pub struct DeploymentOrchestrator {
    store: Arc<dyn CommandStore>,
    platform: Arc<dyn DeploymentPlatform>,
    queue: Arc<dyn JobQueue>,
    retry: RetryScheduler,
    sink: Arc<dyn ErrorSink>,
    options: OrchestratorOptions,
}

impl DeploymentOrchestrator {
    pub fn new(
        store: Arc<dyn CommandStore>,
        platform: Arc<dyn DeploymentPlatform>,
        queue: Arc<dyn JobQueue>,
        retry: RetryScheduler,
        sink: Arc<dyn ErrorSink>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            store,
            platform,
            queue,
            retry,
            sink,
            options,
        }
    }

    /// Run one attempt and return only the reply
    pub async fn execute(&self, command: &Command) -> Result<Response, DispatchError> {
        Ok(self.run(command).await?.response)
    }

    /// Run one attempt of `command`
    pub async fn run(&self, command: &Command) -> Result<DeployExecution, DispatchError> {
        let mut fsm = DeployFsm::new();

        // The caller's copy may predate another attempt finishing
        let command = match self.store.find(command.id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                let err = DispatchError::Internal(format!("unknown command {}", command.id));
                return self.abandon(command, &mut fsm, err);
            }
            Err(err) => return self.abandon(command, &mut fsm, err),
        };

        if command.is_processed() {
            debug!("Command {} already processed, skipping", command.id);
            advance(&mut fsm, DeployEvent::AlreadyProcessed)?;
            return Ok(execution(&fsm, Response::empty(), None));
        }

        advance(&mut fsm, DeployEvent::Validate)?;

        let request = match parse_deploy(&command.command_text) {
            Ok(request) => request,
            Err(err) => {
                advance(&mut fsm, DeployEvent::Reject(err.to_string()))?;
                return self
                    .finish(&command, &fsm, help_response(&[DEPLOY_USAGE.to_string()]), None)
                    .await;
            }
        };

        if command.user.github_token.is_none() {
            return self
                .reject(&command, &mut fsm, DispatchError::GithubNotConnected)
                .await;
        }

        advance(&mut fsm, DeployEvent::Validated)?;

        let pipelines = match self.platform.pipelines().await {
            Ok(pipelines) => pipelines,
            Err(err) => {
                return self
                    .unexpected(&command, &mut fsm, &request.pipeline_name, err)
                    .await
            }
        };

        let target = match resolve(
            &pipelines,
            &request.pipeline_name,
            request.environment.as_deref(),
            request.application.as_deref(),
        ) {
            Ok(target) => target,
            Err(err) => return self.reject(&command, &mut fsm, err).await,
        };

        let Some(repository) = target.pipeline.repository.as_ref() else {
            let err = DispatchError::RepositoryNotConnected(target.pipeline.id.clone());
            return self.reject(&command, &mut fsm, err).await;
        };

        advance(&mut fsm, DeployEvent::Resolved)?;

        let submit = SubmitBuildRequest {
            application_id: target.application.id.clone(),
            application_name: target.application.name.clone(),
            repository: repository.name_with_owner.clone(),
            branch: request
                .branch
                .clone()
                .unwrap_or_else(|| repository.default_branch.clone()),
            environment: target.environment.clone(),
            forced: request.forced,
            second_factor: request.second_factor,
            notify: NotifyPayload {
                room: command.channel_name.clone(),
                user: command.user.slack_user_id.clone(),
                team_id: command.team_id.clone(),
                user_name: command.user.slack_user_name.clone(),
            },
        };

        info!(
            "Submitting {}@{} to {} ({}) for command {}",
            submit.repository, submit.branch, submit.application_name, submit.environment, command.id
        );

        match self.platform.submit(submit).await {
            Ok(mut build) => {
                advance(&mut fsm, DeployEvent::LockGranted)?;
                build.command_id = Some(command.id);
                self.schedule_reaper(&build).await;
                advance(&mut fsm, DeployEvent::Submitted)?;

                let response = if self.options.announce_deploys {
                    deploying_message(&build, &command.user.slack_user_id)
                } else {
                    Response::empty()
                };
                self.finish(&command, &fsm, response, Some(build)).await
            }
            Err(DispatchError::Locked(application)) => {
                self.handle_locked(&command, &mut fsm, &request.pipeline_name, application)
                    .await
            }
            Err(err) if err.is_domain() => {
                advance(&mut fsm, DeployEvent::Fail(err.to_string()))?;
                let response = domain_error_response(&err, &self.options.links)
                    .unwrap_or_else(|| error_response_for(err.to_string()));
                self.finish(&command, &fsm, response, None).await
            }
            Err(err) => {
                self.unexpected(&command, &mut fsm, &request.pipeline_name, err)
                    .await
            }
        }
    }

    async fn handle_locked(
        &self,
        command: &Command,
        fsm: &mut DeployFsm,
        pipeline_name: &str,
        application: String,
    ) -> Result<DeployExecution, DispatchError> {
        match self.retry.schedule_retry(command, self.options.retry_delay).await {
            Ok(true) => {
                advance(fsm, DeployEvent::LockContended)?;
                Ok(execution(fsm, Response::empty(), None))
            }
            Ok(false) => {
                let err = DispatchError::Locked(application);
                info!("Command {} gave up: {}", command.id, err);
                advance(fsm, DeployEvent::Fail(err.to_string()))?;
                self.finish(command, fsm, error_response_for(err.to_string()), None)
                    .await
            }
            Err(err) => self.unexpected(command, fsm, pipeline_name, err).await,
        }
    }

    async fn reject(
        &self,
        command: &Command,
        fsm: &mut DeployFsm,
        err: DispatchError,
    ) -> Result<DeployExecution, DispatchError> {
        let event = match &err {
            DispatchError::AmbiguousApplication { .. } => DeployEvent::Ambiguous,
            _ => DeployEvent::Reject(err.to_string()),
        };
        advance(fsm, event)?;

        let response = domain_error_response(&err, &self.options.links)
            .unwrap_or_else(|| response_for(err.to_string()));
        self.finish(command, fsm, response, None).await
    }

    async fn unexpected(
        &self,
        command: &Command,
        fsm: &mut DeployFsm,
        pipeline_name: &str,
        err: DispatchError,
    ) -> Result<DeployExecution, DispatchError> {
        advance(fsm, DeployEvent::Fail(err.to_string()))?;
        self.report(err)?;

        let response = response_for(format!(
            "Unable to fetch deployment info for {}.",
            pipeline_name
        ));
        self.finish(command, fsm, response, None).await
    }

    /// Give up on a command that cannot be loaded; nothing is submitted
    fn abandon(
        &self,
        command: &Command,
        fsm: &mut DeployFsm,
        err: DispatchError,
    ) -> Result<DeployExecution, DispatchError> {
        advance(fsm, DeployEvent::Fail(err.to_string()))?;
        self.report(err)?;

        let response = match parse_deploy(&command.command_text) {
            Ok(request) => format!(
                "Unable to fetch deployment info for {}.",
                request.pipeline_name
            ),
            Err(_) => "Unable to fetch deployment info.".to_string(),
        };
        Ok(execution(fsm, response_for(response), None))
    }

    /// Propagate in strict mode, otherwise hand the error to the sink
    fn report(&self, err: DispatchError) -> Result<(), DispatchError> {
        if self.options.strict_mode {
            return Err(err);
        }
        self.sink.report_exception(&err);
        Ok(())
    }

    /// Mark the command processed; only the attempt that wins replies
    async fn finish(
        &self,
        command: &Command,
        fsm: &DeployFsm,
        response: Response,
        build: Option<BuildRequest>,
    ) -> Result<DeployExecution, DispatchError> {
        let won = match self.store.mark_processed(command.id, Utc::now()).await {
            Ok(won) => won,
            Err(err) => {
                self.report(err)?;
                true
            }
        };
        if !won {
            debug!("Command {} finalized by another attempt", command.id);
        }

        let response = if won { response } else { Response::empty() };
        Ok(execution(fsm, response, build))
    }

    async fn schedule_reaper(&self, build: &BuildRequest) {
        let job = Job::ReapDeployment {
            build: build.clone(),
            attempt: 0,
        };
        if let Err(err) = self.queue.enqueue(job, self.options.reaper_delay).await {
            error!("Unable to schedule reaper for build {}: {}", build.id, err);
            self.sink.report_exception(&err);
        }
    }
}

fn advance(fsm: &mut DeployFsm, event: DeployEvent) -> Result<DeployState, DispatchError> {
    fsm.process(event).map_err(|e| {
        warn!("{}", e);
        DispatchError::Internal(e)
    })
}

fn execution(fsm: &DeployFsm, response: Response, build: Option<BuildRequest>) -> DeployExecution {
    DeployExecution {
        state: fsm.state(),
        response,
        build,
    }
}
