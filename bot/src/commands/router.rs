//! Task name dispatch

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use chat_api::Response;

use crate::commands::CommandHandler;
use crate::errors::DispatchError;
use crate::format::response::help_response;
use crate::models::command::Command;

/// Routes commands to the handler registered for their task
#[derive(Default)]
pub struct CommandRouter {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
    order: Vec<&'static str>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, replacing any handler for the same task
    pub fn with_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        let task = handler.task();
        if self.handlers.insert(task, handler).is_none() {
            self.order.push(task);
        }
        self
    }

    pub fn tasks(&self) -> &[&'static str] {
        &self.order
    }

    /// Usage for every registered handler
    pub fn help(&self) -> Response {
        let lines: Vec<String> = self
            .order
            .iter()
            .filter_map(|task| self.handlers.get(task))
            .flat_map(|handler| handler.help_documentation())
            .collect();
        help_response(&lines)
    }

    pub async fn dispatch(&self, command: &Command) -> Result<Response, DispatchError> {
        match self.handlers.get(command.task.as_str()) {
            Some(handler) => {
                info!(
                    "Dispatching {}:{} for command {}",
                    command.task, command.subtask, command.id
                );
                handler.execute(command).await
            }
            None => {
                debug!("No handler for task '{}'", command.task);
                Ok(self.help())
            }
        }
    }
}
