//! `deploy` command family

use std::sync::Arc;

use async_trait::async_trait;

use chat_api::Response;

use crate::commands::parser::DEPLOY_USAGE;
use crate::commands::CommandHandler;
use crate::deploy::orchestrator::DeploymentOrchestrator;
use crate::errors::DispatchError;
use crate::format::response::response_for;
use crate::models::command::Command;

pub struct DeployHandler {
    orchestrator: Arc<DeploymentOrchestrator>,
}

impl DeployHandler {
    pub fn new(orchestrator: Arc<DeploymentOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl CommandHandler for DeployHandler {
    fn task(&self) -> &'static str {
        "deploy"
    }

    fn help_documentation(&self) -> Vec<String> {
        vec![DEPLOY_USAGE.to_string()]
    }

    async fn execute(&self, command: &Command) -> Result<Response, DispatchError> {
        match command.subtask.as_str() {
            "default" => self.orchestrator.execute(command).await,
            other => Ok(response_for(format!(
                "deploy:{} is currently unimplemented.",
                other
            ))),
        }
    }
}
