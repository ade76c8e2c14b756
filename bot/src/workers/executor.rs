//! Job executor worker

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::commands::router::CommandRouter;
use crate::errors::DispatchError;
use crate::models::job::Job;
use crate::notify::ChatNotifier;
use crate::storage::commands::CommandStore;
use crate::workers::reaper::Reaper;

/// How often the executor evicts old commands
pub const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Runs queued jobs
pub struct JobRunner {
    store: Arc<dyn CommandStore>,
    router: Arc<CommandRouter>,
    notifier: Arc<dyn ChatNotifier>,
    reaper: Arc<Reaper>,
    retention: Duration,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn CommandStore>,
        router: Arc<CommandRouter>,
        notifier: Arc<dyn ChatNotifier>,
        reaper: Arc<Reaper>,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            router,
            notifier,
            reaper,
            retention,
        }
    }

    /// Drop stored commands older than the retention window
    pub async fn purge_expired(&self) -> Result<usize, DispatchError> {
        let retention = chrono::Duration::from_std(self.retention)
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        let purged = self.store.purge_before(Utc::now() - retention).await?;
        if purged > 0 {
            debug!("Purged {} expired commands", purged);
        }
        Ok(purged)
    }

    pub async fn handle(&self, job: Job) -> Result<(), DispatchError> {
        match job {
            Job::ExecuteCommand { command_id } => {
                let Some(command) = self.store.find(command_id).await? else {
                    warn!("Queued command {} no longer exists", command_id);
                    return Ok(());
                };

                let response = self.router.dispatch(&command).await?;
                self.notifier.post(&command, &response).await
            }
            Job::ReapDeployment { build, attempt } => {
                let outcome = self.reaper.reap(&build, attempt).await?;
                debug!("Reaped build {}: {:?}", build.id, outcome);
                Ok(())
            }
        }
    }
}

/// Run the executor worker until shutdown, then wait for in-flight jobs
pub async fn run(
    runner: Arc<JobRunner>,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Executor worker starting...");

    let mut in_flight = JoinSet::new();
    let mut purge_timer = tokio::time::interval(PURGE_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Executor worker shutting down...");
                break;
            }
            job = receiver.recv() => {
                let Some(job) = job else {
                    info!("Job queue closed, executor worker stopping...");
                    break;
                };

                let kind = job.kind();
                let runner = runner.clone();
                in_flight.spawn(async move {
                    if let Err(e) = runner.handle(job).await {
                        error!("Failed to run {} job: {}", kind, e);
                    }
                });
            }
            _ = purge_timer.tick() => {
                if let Err(e) = runner.purge_expired().await {
                    error!("Failed to purge expired commands: {}", e);
                }
            }
            Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = result {
                    error!("Job task panicked: {}", e);
                }
            }
        }
    }

    while let Some(result) = in_flight.join_next().await {
        if let Err(e) = result {
            error!("Job task panicked: {}", e);
        }
    }
}
