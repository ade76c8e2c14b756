//! Chat command handlers

pub mod deploy;
pub mod parser;
pub mod pipelines;
pub mod releases;
pub mod resolver;
pub mod router;

use async_trait::async_trait;

use chat_api::Response;

use crate::errors::DispatchError;
use crate::models::command::Command;

/// A family of chat commands sharing a task name
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Task word this handler answers to, e.g. `deploy`
    fn task(&self) -> &'static str;

    /// One usage line per supported subtask
    fn help_documentation(&self) -> Vec<String>;

    async fn execute(&self, command: &Command) -> Result<Response, DispatchError>;
}
