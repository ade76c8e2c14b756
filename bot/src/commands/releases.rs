//! `releases` command family

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use chat_api::Response;

use crate::commands::parser::{app_argument, release_version};
use crate::commands::CommandHandler;
use crate::errors::DispatchError;
use crate::format::response::{
    help_response, recent_releases_response, release_info_response, response_for,
};
use crate::models::command::Command;
use crate::platform::DeploymentPlatform;
use crate::reporting::ErrorSink;

/// Releases shown by a plain `releases` command
const RECENT_RELEASES: usize = 10;

pub struct ReleasesHandler {
    platform: Arc<dyn DeploymentPlatform>,
    sink: Arc<dyn ErrorSink>,
    strict_mode: bool,
}

impl ReleasesHandler {
    pub fn new(platform: Arc<dyn DeploymentPlatform>, sink: Arc<dyn ErrorSink>, strict_mode: bool) -> Self {
        Self {
            platform,
            sink,
            strict_mode,
        }
    }

    async fn recent_releases(&self, application: &str) -> Response {
        info!("Fetching releases for {}", application);
        match self.platform.releases(application).await {
            Ok(mut releases) => {
                releases.truncate(RECENT_RELEASES);
                recent_releases_response(application, &releases, Utc::now())
            }
            Err(err) => {
                self.sink.report_exception(&err);
                response_for(format!(
                    "Unable to fetch recent releases for {}.",
                    application
                ))
            }
        }
    }

    async fn release_info(&self, application: &str, version: u64) -> Result<Response, DispatchError> {
        match self.platform.release_info(application, version).await {
            Ok(release) => Ok(release_info_response(application, &release, Utc::now())),
            Err(err) if self.strict_mode => Err(err),
            Err(err) => {
                self.sink.report_exception(&err);
                Ok(response_for(format!(
                    "Unable to fetch release v{} for {}.",
                    version, application
                )))
            }
        }
    }
}

#[async_trait]
impl CommandHandler for ReleasesHandler {
    fn task(&self) -> &'static str {
        "releases"
    }

    fn help_documentation(&self) -> Vec<String> {
        vec![
            "releases -a APP - Display the last 10 releases for APP.".to_string(),
            "releases:info RELEASE - View detailed information for a release.".to_string(),
            "releases:rollback RELEASE - Roll back to an older release.".to_string(),
        ]
    }

    async fn execute(&self, command: &Command) -> Result<Response, DispatchError> {
        let application = app_argument(&command.command_text);

        match (command.subtask.as_str(), application) {
            ("rollback", _) => Ok(response_for("release:rollback is currently unimplemented.")),
            ("info", Some(application)) => match release_version(&command.command_text) {
                Some(version) => self.release_info(&application, version).await,
                None => Ok(response_for(
                    "release:info missing version, should be a number.",
                )),
            },
            (_, Some(application)) => Ok(self.recent_releases(&application).await),
            (_, None) => Ok(help_response(&self.help_documentation())),
        }
    }
}
