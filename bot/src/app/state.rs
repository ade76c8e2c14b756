//! Application state

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::app::options::{AppOptions, PlatformOptions};
use crate::commands::deploy::DeployHandler;
use crate::commands::pipelines::PipelinesHandler;
use crate::commands::releases::ReleasesHandler;
use crate::commands::router::CommandRouter;
use crate::deploy::orchestrator::{DeploymentOrchestrator, OrchestratorOptions};
use crate::deploy::retry::RetryScheduler;
use crate::errors::DispatchError;
use crate::filesys::file::File;
use crate::format::response::Links;
use crate::models::job::Job;
use crate::notify::{ChatNotifier, HttpNotifier};
use crate::platform::http::HttpPlatform;
use crate::platform::memory::MemoryPlatform;
use crate::platform::DeploymentPlatform;
use crate::queue::{JobQueue, TokioJobQueue};
use crate::reporting::{ErrorSink, TracingErrorSink};
use crate::storage::commands::{CommandStore, MemoryCommandStore};
use crate::storage::settings::PlatformBackend;
use crate::workers::executor::JobRunner;
use crate::workers::reaper::Reaper;

/// Shared services of a running dispatcher
pub struct AppState {
    pub store: Arc<dyn CommandStore>,
    pub platform: Arc<dyn DeploymentPlatform>,
    pub queue: Arc<dyn JobQueue>,
    pub notifier: Arc<dyn ChatNotifier>,
    pub sink: Arc<dyn ErrorSink>,
    pub orchestrator: Arc<DeploymentOrchestrator>,
    pub router: Arc<CommandRouter>,
    pub runner: Arc<JobRunner>,
}

impl AppState {
    /// Build the state from options, returning the receiver the executor drains
    pub async fn init(
        options: &AppOptions,
    ) -> Result<(AppState, mpsc::UnboundedReceiver<Job>), DispatchError> {
        let platform = init_platform(&options.platform, &options.links).await?;
        let notifier = Arc::new(HttpNotifier::new(options.platform.timeout)?);

        Ok(Self::assemble(
            options,
            Arc::new(MemoryCommandStore::new()),
            platform,
            notifier,
            Arc::new(TracingErrorSink),
        ))
    }

    /// Wire services around the given adapters
    pub fn assemble(
        options: &AppOptions,
        store: Arc<dyn CommandStore>,
        platform: Arc<dyn DeploymentPlatform>,
        notifier: Arc<dyn ChatNotifier>,
        sink: Arc<dyn ErrorSink>,
    ) -> (AppState, mpsc::UnboundedReceiver<Job>) {
        let (queue, receiver) = TokioJobQueue::new();
        let queue: Arc<dyn JobQueue> = Arc::new(queue);

        let orchestrator = Arc::new(DeploymentOrchestrator::new(
            store.clone(),
            platform.clone(),
            queue.clone(),
            RetryScheduler::new(queue.clone(), options.deploy.command_expiry),
            sink.clone(),
            OrchestratorOptions {
                retry_delay: options.deploy.retry_delay,
                reaper_delay: options.deploy.reaper_delay,
                strict_mode: options.strict_mode,
                announce_deploys: options.deploy.announce_deploys,
                links: options.links.clone(),
            },
        ));

        let router = Arc::new(
            CommandRouter::new()
                .with_handler(Arc::new(DeployHandler::new(orchestrator.clone())))
                .with_handler(Arc::new(PipelinesHandler::new(
                    platform.clone(),
                    sink.clone(),
                    options.links.clone(),
                    options.strict_mode,
                )))
                .with_handler(Arc::new(ReleasesHandler::new(
                    platform.clone(),
                    sink.clone(),
                    options.strict_mode,
                ))),
        );

        let reaper = Arc::new(Reaper::new(
            options.reaper.clone(),
            store.clone(),
            platform.clone(),
            queue.clone(),
            notifier.clone(),
        ));
        let runner = Arc::new(JobRunner::new(
            store.clone(),
            router.clone(),
            notifier.clone(),
            reaper,
            options.deploy.command_retention,
        ));

        let state = AppState {
            store,
            platform,
            queue,
            notifier,
            sink,
            orchestrator,
            router,
            runner,
        };
        (state, receiver)
    }
}

async fn init_platform(
    options: &PlatformOptions,
    links: &Links,
) -> Result<Arc<dyn DeploymentPlatform>, DispatchError> {
    match options.backend {
        PlatformBackend::Http => {
            info!("Using deployment platform at {}", options.base_url);
            Ok(Arc::new(HttpPlatform::new(
                &options.base_url,
                options.api_token.clone(),
                options.timeout,
            )?))
        }
        PlatformBackend::Memory => {
            let path = options.seed_file.clone().ok_or_else(|| {
                DispatchError::ConfigError("memory backend requires a seed file".to_string())
            })?;
            info!("Using in-memory deployment platform seeded from {}", path.display());
            let platform =
                MemoryPlatform::from_file(&File::new(path), &links.dashboard_url, options.lock_ttl)
                    .await?;
            Ok(Arc::new(platform))
        }
    }
}
