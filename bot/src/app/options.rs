//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::format::response::Links;
use crate::storage::settings::{PlatformBackend, Settings};
use crate::workers::reaper;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Deployment platform configuration
    pub platform: PlatformOptions,

    /// Deploy command tuning
    pub deploy: DeployOptions,

    /// Reaper worker options
    pub reaper: reaper::Options,

    /// Links embedded in replies
    pub links: Links,

    /// Propagate unexpected errors instead of reporting them
    pub strict_mode: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            platform: PlatformOptions {
                backend: settings.platform.backend,
                base_url: settings.platform.base_url.clone(),
                api_token: settings.platform.api_token.clone(),
                timeout: Duration::from_secs(settings.platform.timeout_secs),
                seed_file: settings.platform.seed_file.clone(),
                lock_ttl: settings.deploy.lock_ttl(),
            },
            deploy: DeployOptions {
                retry_delay: settings.deploy.retry_delay(),
                command_expiry: settings.deploy.command_expiry(),
                command_retention: settings.deploy.command_retention(),
                reaper_delay: settings.deploy.reaper_delay(),
                announce_deploys: settings.deploy.announce_deploys,
            },
            reaper: reaper::Options {
                interval: settings.deploy.reaper_interval(),
                max_attempts: settings.deploy.reaper_max_attempts,
            },
            links: Links {
                dashboard_url: settings.platform.dashboard_url.clone(),
                github_auth_url: settings.github.auth_url.clone(),
            },
            strict_mode: settings.strict_mode,
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

/// Deployment platform options
#[derive(Debug, Clone)]
pub struct PlatformOptions {
    pub backend: PlatformBackend,
    pub base_url: String,
    pub api_token: Option<SecretString>,
    pub timeout: Duration,
    pub seed_file: Option<PathBuf>,
    pub lock_ttl: Duration,
}

/// Deploy command options
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub retry_delay: Duration,
    pub command_expiry: Duration,
    pub command_retention: Duration,
    pub reaper_delay: Duration,
    pub announce_deploys: bool,
}
