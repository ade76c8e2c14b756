//! Shared fixtures for integration tests

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use chat_api::Response;
use deploybot::deploy::orchestrator::{DeploymentOrchestrator, OrchestratorOptions};
use deploybot::deploy::retry::RetryScheduler;
use deploybot::errors::DispatchError;
use deploybot::format::response::Links;
use deploybot::models::command::{ChatUser, Command};
use deploybot::models::job::Job;
use deploybot::notify::ChatNotifier;
use deploybot::platform::memory::{MemoryPlatform, MemorySeed};
use deploybot::platform::DeploymentPlatform;
use deploybot::queue::JobQueue;
use deploybot::reporting::ErrorSink;
use deploybot::storage::commands::{CommandStore, MemoryCommandStore};
use platform_api::{
    Application, BuildRequest, BuildStatus, Pipeline, Release, RepositoryRef, SubmitBuildRequest,
};

pub const HUBOT_APP_ID: &str = "27bde4b5-b431-4117-9302-e533b887faaa";

pub fn links() -> Links {
    Links {
        dashboard_url: "https://dashboard.heroku.com".to_string(),
        github_auth_url: "https://github.com/login/oauth/authorize".to_string(),
    }
}

pub fn user() -> ChatUser {
    ChatUser {
        slack_user_id: "U123".to_string(),
        slack_user_name: "atmos".to_string(),
        github_token: Some("gho_token".to_string()),
    }
}

fn app(id: &str, name: &str, environment: &str) -> Application {
    Application {
        id: id.to_string(),
        name: name.to_string(),
        environment: environment.to_string(),
    }
}

pub fn pipelines() -> Vec<Pipeline> {
    let mut hubot = BTreeMap::new();
    hubot.insert(
        "production".to_string(),
        vec![app(HUBOT_APP_ID, "hubot", "production")],
    );

    let mut beeper = BTreeMap::new();
    beeper.insert(
        "production".to_string(),
        vec![
            app("b0a1", "beeper-production-foo", "production"),
            app("b0a2", "beeper-production", "production"),
        ],
    );

    let mut unconnected = BTreeMap::new();
    unconnected.insert(
        "production".to_string(),
        vec![app("c0a1", "orphan", "production")],
    );

    vec![
        Pipeline {
            id: "531a6f90-bd76-4f5c-811f-acc8a9f4c111".to_string(),
            name: "hubot".to_string(),
            environments: hubot,
            default_environment: "production".to_string(),
            repository: Some(RepositoryRef {
                name_with_owner: "atmos/hubot".to_string(),
                default_branch: "master".to_string(),
            }),
        },
        Pipeline {
            id: "6c18c922-6eee-451c-b7c6-c76278652ccc".to_string(),
            name: "pipeline-with-multiple-apps".to_string(),
            environments: beeper,
            default_environment: "production".to_string(),
            repository: Some(RepositoryRef {
                name_with_owner: "atmos/beeper".to_string(),
                default_branch: "main".to_string(),
            }),
        },
        Pipeline {
            id: "7d29da33".to_string(),
            name: "unconnected".to_string(),
            environments: unconnected,
            default_environment: "production".to_string(),
            repository: None,
        },
    ]
}

pub fn memory_platform() -> MemoryPlatform {
    MemoryPlatform::new(
        MemorySeed {
            pipelines: pipelines(),
            releases: HashMap::new(),
            build_duration_secs: None,
        },
        "https://dashboard.heroku.com",
        Duration::from_secs(600),
    )
}

/// Memory platform whose calls can be made to fail
pub struct ScriptedPlatform {
    pub inner: MemoryPlatform,
    submit_failure: Mutex<Option<Box<dyn Fn(&SubmitBuildRequest) -> DispatchError + Send>>>,
    fail_pipelines: AtomicBool,
}

impl ScriptedPlatform {
    pub fn new(inner: MemoryPlatform) -> Self {
        Self {
            inner,
            submit_failure: Mutex::new(None),
            fail_pipelines: AtomicBool::new(false),
        }
    }

    pub fn fail_submit_with(
        &self,
        failure: impl Fn(&SubmitBuildRequest) -> DispatchError + Send + 'static,
    ) {
        *self.submit_failure.lock().unwrap() = Some(Box::new(failure));
    }

    pub fn fail_pipelines(&self) {
        self.fail_pipelines.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeploymentPlatform for ScriptedPlatform {
    async fn pipelines(&self) -> Result<Vec<Pipeline>, DispatchError> {
        if self.fail_pipelines.load(Ordering::SeqCst) {
            return Err(DispatchError::Transient("platform unavailable".to_string()));
        }
        self.inner.pipelines().await
    }

    async fn submit(&self, request: SubmitBuildRequest) -> Result<BuildRequest, DispatchError> {
        let failure = self
            .submit_failure
            .lock()
            .unwrap()
            .as_ref()
            .map(|failure| failure(&request));
        match failure {
            Some(err) => Err(err),
            None => self.inner.submit(request).await,
        }
    }

    async fn build_status(&self, build: &BuildRequest) -> Result<BuildStatus, DispatchError> {
        self.inner.build_status(build).await
    }

    async fn releases(&self, application: &str) -> Result<Vec<Release>, DispatchError> {
        self.inner.releases(application).await
    }

    async fn release_info(&self, application: &str, version: u64) -> Result<Release, DispatchError> {
        self.inner.release_info(application, version).await
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    pub jobs: Mutex<Vec<(Job, Duration)>>,
}

impl RecordingQueue {
    pub fn retries(&self) -> Vec<(Uuid, Duration)> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(job, delay)| match job {
                Job::ExecuteCommand { command_id } => Some((*command_id, *delay)),
                _ => None,
            })
            .collect()
    }

    pub fn reaps(&self) -> Vec<(BuildRequest, u32, Duration)> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(job, delay)| match job {
                Job::ReapDeployment { build, attempt } => Some((build.clone(), *attempt, *delay)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: Job, delay: Duration) -> Result<(), DispatchError> {
        self.jobs.lock().unwrap().push((job, delay));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub errors: Mutex<Vec<String>>,
}

impl ErrorSink for RecordingSink {
    fn report_exception(&self, error: &DispatchError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub posts: Mutex<Vec<(Uuid, Response)>>,
}

impl RecordingNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, response)| response.text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatNotifier for RecordingNotifier {
    async fn post(&self, command: &Command, response: &Response) -> Result<(), DispatchError> {
        if !response.is_empty() {
            self.posts
                .lock()
                .unwrap()
                .push((command.id, response.clone()));
        }
        Ok(())
    }
}

/// Orchestrator wired to in-memory fakes
pub struct Harness {
    pub store: Arc<MemoryCommandStore>,
    pub platform: Arc<ScriptedPlatform>,
    pub queue: Arc<RecordingQueue>,
    pub sink: Arc<RecordingSink>,
    pub orchestrator: DeploymentOrchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(false, false)
    }

    pub fn with_options(strict_mode: bool, announce_deploys: bool) -> Self {
        let store = Arc::new(MemoryCommandStore::new());
        let platform = Arc::new(ScriptedPlatform::new(memory_platform()));
        let queue = Arc::new(RecordingQueue::default());
        let sink = Arc::new(RecordingSink::default());

        let orchestrator = DeploymentOrchestrator::new(
            store.clone(),
            platform.clone(),
            queue.clone(),
            RetryScheduler::new(queue.clone(), Duration::from_secs(60)),
            sink.clone(),
            OrchestratorOptions {
                retry_delay: Duration::from_secs(2),
                reaper_delay: Duration::from_secs(10),
                strict_mode,
                announce_deploys,
                links: links(),
            },
        );

        Self {
            store,
            platform,
            queue,
            sink,
            orchestrator,
        }
    }

    /// Store a command issued by the default user
    pub async fn command(&self, text: &str) -> Command {
        let command = Command::new(text, "ops", "T123", user());
        self.store.insert(command.clone()).await.unwrap();
        command
    }

    pub async fn stored(&self, command: &Command) -> Command {
        self.store.find(command.id).await.unwrap().unwrap()
    }

    /// Take the hubot lock as if another deploy were running
    pub fn hold_hubot_lock(&self) {
        assert!(self
            .platform
            .inner
            .locks()
            .acquire(HUBOT_APP_ID, Duration::from_secs(600))
            .is_granted());
    }

    pub fn release_hubot_lock(&self) {
        self.platform.inner.locks().release(HUBOT_APP_ID);
    }
}
