//! In-process deployment platform
//!
//! Holds pipelines, builds and releases in memory and guards submissions
//! with a [`LockManager`]. Used for local runs against a seed file.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use platform_api::{
    BuildRequest, BuildStatus, Pipeline, Release, ReleaseUser, SubmitBuildRequest,
};

use crate::deploy::lock::{LockManager, LockOutcome};
use crate::errors::DispatchError;
use crate::filesys::file::File;
use crate::platform::DeploymentPlatform;

/// Initial contents of a memory platform
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemorySeed {
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,

    /// Releases by application name
    #[serde(default)]
    pub releases: HashMap<String, Vec<Release>>,

    /// Pending builds report success once this old; they stay pending when unset
    #[serde(default)]
    pub build_duration_secs: Option<u64>,
}

struct BuildRecord {
    build: BuildRequest,
    status: BuildStatus,
    holder_token: Uuid,
    submitted_at: DateTime<Utc>,
}

/// Deployment platform kept in memory
pub struct MemoryPlatform {
    pipelines: RwLock<Vec<Pipeline>>,
    releases: RwLock<HashMap<String, Vec<Release>>>,
    builds: RwLock<HashMap<String, BuildRecord>>,
    locks: Arc<LockManager>,
    lock_ttl: Duration,
    build_duration: Option<Duration>,
    dashboard_url: String,
}

impl MemoryPlatform {
    pub fn new(seed: MemorySeed, dashboard_url: &str, lock_ttl: Duration) -> Self {
        Self {
            pipelines: RwLock::new(seed.pipelines),
            releases: RwLock::new(seed.releases),
            builds: RwLock::new(HashMap::new()),
            locks: Arc::new(LockManager::new()),
            lock_ttl,
            build_duration: seed.build_duration_secs.map(Duration::from_secs),
            dashboard_url: dashboard_url.trim_end_matches('/').to_string(),
        }
    }

    /// Load a seed JSON file
    pub async fn from_file(
        file: &File,
        dashboard_url: &str,
        lock_ttl: Duration,
    ) -> Result<Self, DispatchError> {
        let seed: MemorySeed = file.read_json().await?;
        info!(
            "Loaded {} pipelines from {}",
            seed.pipelines.len(),
            file.path().display()
        );
        Ok(Self::new(seed, dashboard_url, lock_ttl))
    }

    /// Lock table guarding submissions
    pub fn locks(&self) -> Arc<LockManager> {
        self.locks.clone()
    }

    /// Finish a pending build, release its lock and record a release on success
    pub async fn finish_build(&self, build_id: &str, succeeded: bool) -> Result<(), DispatchError> {
        let mut builds = self.builds.write().await;
        let record = builds
            .get_mut(build_id)
            .ok_or_else(|| DispatchError::Transient(format!("unknown build {}", build_id)))?;
        if record.status.is_finished() {
            return Ok(());
        }

        let target_url = record.build.dashboard_url.clone();
        record.status = if succeeded {
            BuildStatus::Succeeded { target_url }
        } else {
            BuildStatus::Failed { target_url }
        };
        self.locks
            .release_if_held_by(&record.build.application_id, record.holder_token);

        if succeeded {
            let mut releases = self.releases.write().await;
            let history = releases
                .entry(record.build.application_name.clone())
                .or_default();
            let version = history.iter().map(|r| r.version).max().unwrap_or(0) + 1;
            history.push(Release {
                version,
                description: format!("Deploy {}", record.build.short_sha()),
                user: ReleaseUser {
                    email: "deploybot@localhost".to_string(),
                },
                created_at: Utc::now(),
            });
        }

        Ok(())
    }
}

impl MemoryPlatform {
    async fn build_status_of(&self, build_id: &str) -> Result<BuildStatus, DispatchError> {
        self.builds
            .read()
            .await
            .get(build_id)
            .map(|record| record.status.clone())
            .ok_or_else(|| DispatchError::Transient(format!("unknown build {}", build_id)))
    }
}

fn fake_sha() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())[..40].to_string()
}

#[async_trait]
impl DeploymentPlatform for MemoryPlatform {
    async fn pipelines(&self) -> Result<Vec<Pipeline>, DispatchError> {
        Ok(self.pipelines.read().await.clone())
    }

    async fn submit(&self, request: SubmitBuildRequest) -> Result<BuildRequest, DispatchError> {
        let known = self.pipelines.read().await.iter().any(|p| {
            p.environments
                .values()
                .flatten()
                .any(|app| app.id == request.application_id)
        });
        if !known {
            return Err(DispatchError::Transient(format!(
                "unknown application {}",
                request.application_id
            )));
        }

        let lock = match self.locks.acquire(&request.application_id, self.lock_ttl) {
            LockOutcome::Granted(lock) => lock,
            LockOutcome::AlreadyHeld(_) => {
                return Err(DispatchError::Locked(request.application_name))
            }
        };

        let id = Uuid::new_v4().to_string();
        let build = BuildRequest {
            dashboard_url: format!(
                "{}/apps/{}/activity/builds/{}",
                self.dashboard_url, request.application_name, id
            ),
            id,
            application_id: request.application_id,
            application_name: request.application_name,
            command_id: None,
            sha: fake_sha(),
            branch: request.branch,
            environment: request.environment,
            forced: request.forced,
            repository: request.repository,
        };

        self.builds.write().await.insert(
            build.id.clone(),
            BuildRecord {
                build: build.clone(),
                status: BuildStatus::Pending,
                holder_token: lock.holder_token,
                submitted_at: Utc::now(),
            },
        );

        Ok(build)
    }

    async fn build_status(&self, build: &BuildRequest) -> Result<BuildStatus, DispatchError> {
        let (status, submitted_at) = self
            .builds
            .read()
            .await
            .get(&build.id)
            .map(|record| (record.status.clone(), record.submitted_at))
            .ok_or_else(|| DispatchError::Transient(format!("unknown build {}", build.id)))?;

        let due = self.build_duration.is_some_and(|duration| {
            (Utc::now() - submitted_at).to_std().unwrap_or_default() >= duration
        });
        if status.is_finished() || !due {
            return Ok(status);
        }

        self.finish_build(&build.id, true).await?;
        self.build_status_of(&build.id).await
    }

    async fn releases(&self, application: &str) -> Result<Vec<Release>, DispatchError> {
        let releases = self.releases.read().await;
        let mut history = releases.get(application).cloned().unwrap_or_default();
        history.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(history)
    }

    async fn release_info(
        &self,
        application: &str,
        version: u64,
    ) -> Result<Release, DispatchError> {
        self.releases
            .read()
            .await
            .get(application)
            .and_then(|history| history.iter().find(|r| r.version == version))
            .cloned()
            .ok_or_else(|| {
                DispatchError::Transient(format!("release v{} not found for {}", version, application))
            })
    }
}
