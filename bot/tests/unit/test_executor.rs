//! Executor worker tests

use std::sync::Arc;
use std::time::Duration;

use deploybot::app::options::AppOptions;
use deploybot::app::state::AppState;
use deploybot::models::command::Command;
use deploybot::models::job::Job;
use deploybot::platform::memory::MemoryPlatform;
use deploybot::storage::commands::{CommandStore, MemoryCommandStore};
use deploybot::workers::executor;

use crate::common::{memory_platform, user, RecordingNotifier, RecordingSink, HUBOT_APP_ID};

struct Running {
    state: AppState,
    platform: Arc<MemoryPlatform>,
    notifier: Arc<RecordingNotifier>,
    shutdown: tokio::sync::oneshot::Sender<()>,
    worker: tokio::task::JoinHandle<()>,
}

fn start() -> Running {
    start_with_store(Arc::new(MemoryCommandStore::new()))
}

fn start_with_store(store: Arc<MemoryCommandStore>) -> Running {
    let mut options = AppOptions::default();
    options.deploy.retry_delay = Duration::from_millis(20);
    options.deploy.reaper_delay = Duration::from_secs(600);
    options.deploy.announce_deploys = true;

    let platform = Arc::new(memory_platform());
    let notifier = Arc::new(RecordingNotifier::default());
    let (state, receiver) = AppState::assemble(
        &options,
        store,
        platform.clone(),
        notifier.clone(),
        Arc::new(RecordingSink::default()),
    );

    let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let runner = state.runner.clone();
    let worker = tokio::spawn(async move {
        executor::run(
            runner,
            receiver,
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        )
        .await;
    });

    Running {
        state,
        platform,
        notifier,
        shutdown,
        worker,
    }
}

async fn wait_for_posts(notifier: &RecordingNotifier, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while notifier.posts.lock().unwrap().len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("notifier never received the reply");
}

#[tokio::test]
async fn test_queued_command_reply_is_posted() {
    let running = start();
    let command = Command::new("pipelines", "ops", "T123", user());
    running.state.store.insert(command.clone()).await.unwrap();

    running
        .state
        .queue
        .enqueue(Job::ExecuteCommand { command_id: command.id }, Duration::ZERO)
        .await
        .unwrap();
    wait_for_posts(&running.notifier, 1).await;

    assert_eq!(
        running.notifier.texts(),
        vec!["You can deploy: hubot, pipeline-with-multiple-apps, unconnected.".to_string()]
    );

    running.shutdown.send(()).unwrap();
    running.worker.await.unwrap();
}

#[tokio::test]
async fn test_contended_deploy_goes_through_once_lock_frees() {
    let running = start();
    let locks = running.platform.locks();
    assert!(locks
        .acquire(HUBOT_APP_ID, Duration::from_secs(600))
        .is_granted());

    let command = Command::new("deploy hubot to production", "ops", "T123", user());
    running.state.store.insert(command.clone()).await.unwrap();

    let response = running.state.router.dispatch(&command).await.unwrap();
    assert!(response.is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(running.notifier.texts().is_empty());

    locks.release(HUBOT_APP_ID);
    wait_for_posts(&running.notifier, 1).await;

    let texts = running.notifier.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("<@U123> is <"), "{}", texts[0]);
    assert!(texts[0].ends_with("to production."), "{}", texts[0]);

    let stored = running.state.store.find(command.id).await.unwrap().unwrap();
    assert!(stored.processed_at.is_some());

    running.shutdown.send(()).unwrap();
    running.worker.await.unwrap();
}

#[tokio::test]
async fn test_commands_past_retention_are_purged() {
    let store = Arc::new(MemoryCommandStore::new());
    let mut stale = Command::new("deploy hubot to production", "ops", "T123", user());
    stale.created_at = chrono::Utc::now() - chrono::Duration::hours(2);
    let fresh = Command::new("pipelines", "ops", "T123", user());
    store.insert(stale.clone()).await.unwrap();
    store.insert(fresh.clone()).await.unwrap();

    let running = start_with_store(store.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while store.find(stale.id).await.unwrap().is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stale command was never purged");

    assert!(store.find(fresh.id).await.unwrap().is_some());
    assert_eq!(running.state.runner.purge_expired().await.unwrap(), 0);

    running.shutdown.send(()).unwrap();
    running.worker.await.unwrap();
}
