//! `pipelines` command family

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use chat_api::Response;

use crate::commands::parser::app_argument;
use crate::commands::CommandHandler;
use crate::errors::DispatchError;
use crate::format::response::{
    domain_error_response, help_response, pipeline_info_response, pipeline_list_response,
    response_for, Links,
};
use crate::models::command::Command;
use crate::platform::DeploymentPlatform;
use crate::reporting::ErrorSink;

pub struct PipelinesHandler {
    platform: Arc<dyn DeploymentPlatform>,
    sink: Arc<dyn ErrorSink>,
    links: Links,
    strict_mode: bool,
}

impl PipelinesHandler {
    pub fn new(
        platform: Arc<dyn DeploymentPlatform>,
        sink: Arc<dyn ErrorSink>,
        links: Links,
        strict_mode: bool,
    ) -> Self {
        Self {
            platform,
            sink,
            links,
            strict_mode,
        }
    }

    async fn run_on_subtask(&self, command: &Command) -> Result<Response, DispatchError> {
        if command.user.github_token.is_none() {
            return Ok(domain_error_response(&DispatchError::GithubNotConnected, &self.links)
                .unwrap_or_default());
        }

        match command.subtask.as_str() {
            "info" => {
                let Some(name) = app_argument(&command.command_text) else {
                    return Ok(help_response(&self.help_documentation()));
                };
                let pipelines = self.platform.pipelines().await?;
                match pipelines.iter().find(|p| p.name == name) {
                    Some(pipeline) => Ok(pipeline_info_response(pipeline, &self.links)),
                    None => Ok(response_for(
                        DispatchError::PipelineNotFound(name).to_string(),
                    )),
                }
            }
            "list" | "default" => {
                let pipelines = self.platform.pipelines().await?;
                Ok(pipeline_list_response(&pipelines))
            }
            other => Ok(response_for(format!(
                "pipeline:{} is currently unimplemented.",
                other
            ))),
        }
    }
}

#[async_trait]
impl CommandHandler for PipelinesHandler {
    fn task(&self) -> &'static str {
        "pipelines"
    }

    fn help_documentation(&self) -> Vec<String> {
        vec![
            "pipelines - View available pipelines.".to_string(),
            "pipelines:info -a APP - View detailed information for a pipeline.".to_string(),
        ]
    }

    async fn execute(&self, command: &Command) -> Result<Response, DispatchError> {
        match self.run_on_subtask(command).await {
            Ok(response) => Ok(response),
            Err(err) if self.strict_mode => Err(err),
            Err(err) => {
                info!("pipelines command {} failed: {}", command.id, err);
                self.sink.report_exception(&err);
                let text = match app_argument(&command.command_text) {
                    Some(name) => format!("Unable to fetch pipeline info for {}.", name),
                    None => "Unable to fetch pipelines.".to_string(),
                };
                Ok(response_for(text))
            }
        }
    }
}
