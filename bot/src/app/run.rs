//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::DispatchError;
use crate::models::job::Job;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::executor;

/// Run the dispatcher until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DispatchError> {
    info!("Initializing deploybot...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    let app_state = match init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("Failed to start deploybot: {}", e);
            shutdown_manager.shutdown().await?;
            return Err(e);
        }
    };

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    let result = shutdown_manager.shutdown().await;

    // Delayed retries and reaper checks live only in this process
    let dropped = app_state.queue.pending();
    if dropped > 0 {
        warn!("Dropping {} delayed jobs that had not come due", dropped);
    }

    result
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, DispatchError> {
    let (app_state, receiver) = AppState::init(options).await?;
    let app_state = Arc::new(app_state);

    init_executor_worker(
        app_state.clone(),
        receiver,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    init_server(
        options,
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )
    .await?;

    Ok(app_state)
}

fn init_executor_worker(
    app_state: Arc<AppState>,
    receiver: mpsc::UnboundedReceiver<Job>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DispatchError> {
    info!("Initializing executor worker...");

    let runner = app_state.runner.clone();
    let handle = tokio::spawn(async move {
        executor::run(
            runner,
            receiver,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_executor_worker_handle(handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DispatchError> {
    info!("Initializing HTTP server...");

    let server_state = ServerState::new(app_state.store.clone(), app_state.router.clone());

    let handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    server_handle: Option<JoinHandle<Result<(), DispatchError>>>,
    executor_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            server_handle: None,
            executor_worker_handle: None,
        }
    }

    fn with_executor_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), DispatchError> {
        if self.executor_worker_handle.is_some() {
            return Err(DispatchError::ShutdownError(
                "executor_handle already set".to_string(),
            ));
        }
        self.executor_worker_handle = Some(handle);
        Ok(())
    }

    fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DispatchError>>,
    ) -> Result<(), DispatchError> {
        if self.server_handle.is_some() {
            return Err(DispatchError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), DispatchError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DispatchError::ShutdownError(format!(
                "shutdown timed out after {:?}",
                self.lifecycle_options.max_shutdown_delay
            ))),
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), DispatchError> {
        info!("Shutting down deploybot...");

        // 1. Server, so no new commands arrive
        if let Some(handle) = self.server_handle.take() {
            handle
                .await
                .map_err(|e| DispatchError::ShutdownError(e.to_string()))??;
        }

        // 2. Executor worker, which drains in-flight jobs
        if let Some(handle) = self.executor_worker_handle.take() {
            handle
                .await
                .map_err(|e| DispatchError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
