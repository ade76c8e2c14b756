//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::errors::DispatchError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Dispatcher settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for rotated log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub json_logs: bool,

    /// Propagate unexpected errors to the caller instead of apologising
    #[serde(default)]
    pub strict_mode: bool,

    #[serde(default)]
    pub platform: PlatformSettings,

    #[serde(default)]
    pub github: GithubSettings,

    #[serde(default)]
    pub deploy: DeploySettings,

    #[serde(default)]
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            json_logs: false,
            strict_mode: false,
            platform: PlatformSettings::default(),
            github: GithubSettings::default(),
            deploy: DeploySettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file, falling back to defaults when it is missing
    pub async fn load(file: &File) -> Result<Self, DispatchError> {
        let settings = if file.exists().await {
            file.read_json::<Settings>().await?
        } else {
            Settings::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        for (name, value) in [
            ("platform.base_url", &self.platform.base_url),
            ("platform.dashboard_url", &self.platform.dashboard_url),
            ("github.auth_url", &self.github.auth_url),
        ] {
            Url::parse(value)
                .map_err(|e| DispatchError::ConfigError(format!("{name}: {e}")))?;
        }

        if self.platform.backend == PlatformBackend::Memory && self.platform.seed_file.is_none() {
            return Err(DispatchError::ConfigError(
                "platform.seed_file is required for the memory backend".to_string(),
            ));
        }

        if self.deploy.retry_delay_secs == 0 {
            return Err(DispatchError::ConfigError(
                "deploy.retry_delay_secs must be greater than zero".to_string(),
            ));
        }

        if self.deploy.retry_delay_secs >= self.deploy.command_expiry_secs {
            return Err(DispatchError::ConfigError(
                "deploy.retry_delay_secs must be shorter than deploy.command_expiry_secs"
                    .to_string(),
            ));
        }

        // Reaper reports look the command up after the build finishes
        let reaper_window = self.deploy.reaper_delay_secs
            + self.deploy.reaper_interval_secs * u64::from(self.deploy.reaper_max_attempts);
        if self.deploy.command_retention_secs <= reaper_window.max(self.deploy.command_expiry_secs) {
            return Err(DispatchError::ConfigError(
                "deploy.command_retention_secs must outlast the expiry and reaper windows"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Which deployment platform adapter to run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformBackend {
    #[default]
    Http,
    /// In-process platform seeded from a pipelines file, for local runs
    Memory,
}

/// Deployment platform settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSettings {
    #[serde(default)]
    pub backend: PlatformBackend,

    #[serde(default = "default_platform_url")]
    pub base_url: String,

    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,

    #[serde(default)]
    pub api_token: Option<SecretString>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pipelines JSON used by the memory backend
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

fn default_platform_url() -> String {
    "https://api.heroku.com".to_string()
}

fn default_dashboard_url() -> String {
    "https://dashboard.heroku.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            backend: PlatformBackend::Http,
            base_url: default_platform_url(),
            dashboard_url: default_dashboard_url(),
            api_token: None,
            timeout_secs: default_timeout_secs(),
            seed_file: None,
        }
    }
}

/// Source hosting settings
#[derive(Debug, Clone, Deserialize)]
pub struct GithubSettings {
    /// Where users are sent to connect their GitHub account
    #[serde(default = "default_github_auth_url")]
    pub auth_url: String,
}

fn default_github_auth_url() -> String {
    "https://github.com/login/oauth/authorize".to_string()
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            auth_url: default_github_auth_url(),
        }
    }
}

/// Deploy command tuning
#[derive(Debug, Clone, Deserialize)]
pub struct DeploySettings {
    /// Delay before a lock-contended command is re-run
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Age after which a command no longer retries on contention
    #[serde(default = "default_command_expiry_secs")]
    pub command_expiry_secs: u64,

    /// Age after which a stored command is evicted
    #[serde(default = "default_command_retention_secs")]
    pub command_retention_secs: u64,

    /// Delay before the first reaper check of a submitted build
    #[serde(default = "default_reaper_delay_secs")]
    pub reaper_delay_secs: u64,

    /// Delay between subsequent reaper checks
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    #[serde(default = "default_reaper_max_attempts")]
    pub reaper_max_attempts: u32,

    /// Lifetime of a deploy lock held by the memory platform
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Reply with an "is deploying" message instead of staying quiet on success
    #[serde(default)]
    pub announce_deploys: bool,
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_command_expiry_secs() -> u64 {
    60
}

fn default_command_retention_secs() -> u64 {
    3600
}

fn default_reaper_delay_secs() -> u64 {
    10
}

fn default_reaper_interval_secs() -> u64 {
    10
}

fn default_reaper_max_attempts() -> u32 {
    30
}

fn default_lock_ttl_secs() -> u64 {
    600
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay_secs(),
            command_expiry_secs: default_command_expiry_secs(),
            command_retention_secs: default_command_retention_secs(),
            reaper_delay_secs: default_reaper_delay_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
            reaper_max_attempts: default_reaper_max_attempts(),
            lock_ttl_secs: default_lock_ttl_secs(),
            announce_deploys: false,
        }
    }
}

impl DeploySettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn command_expiry(&self) -> Duration {
        Duration::from_secs(self.command_expiry_secs)
    }

    pub fn command_retention(&self) -> Duration {
        Duration::from_secs(self.command_retention_secs)
    }

    pub fn reaper_delay(&self) -> Duration {
        Duration::from_secs(self.reaper_delay_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
