//! Chat reply delivery for work finished outside the request

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, warn};

use chat_api::Response;

use crate::errors::DispatchError;
use crate::models::command::Command;

/// Posts replies back to the channel a command came from
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Deliver `response` for `command`. Empty responses are not sent.
    async fn post(&self, command: &Command, response: &Response) -> Result<(), DispatchError>;
}

/// Notifier posting JSON to the command's `response_url`
pub struct HttpNotifier {
    client: Client,
}

impl HttpNotifier {
    pub fn new(timeout: Duration) -> Result<Self, DispatchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChatNotifier for HttpNotifier {
    async fn post(&self, command: &Command, response: &Response) -> Result<(), DispatchError> {
        if response.is_empty() {
            debug!("Nothing to post for command {}", command.id);
            return Ok(());
        }

        let Some(url) = command.response_url.as_deref() else {
            warn!("Command {} has no response url, dropping reply", command.id);
            return Ok(());
        };

        let result = self.client.post(url).json(response).send().await?;
        if !result.status().is_success() {
            let status = result.status();
            error!("Posting reply for command {} failed: {}", command.id, status);
            return Err(DispatchError::Transient(format!(
                "chat reply rejected: {}",
                status
            )));
        }

        Ok(())
    }
}
