//! Requeueing of lock-contended commands

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::errors::DispatchError;
use crate::models::command::Command;
use crate::models::job::Job;
use crate::queue::JobQueue;

/// Re-runs a command later while it is still young and unprocessed.
///
/// Retries are not ordered or fair: a command can keep losing the lock to
/// newer ones until it expires.
pub struct RetryScheduler {
    queue: Arc<dyn JobQueue>,
    expiry: Duration,
}

impl RetryScheduler {
    pub fn new(queue: Arc<dyn JobQueue>, expiry: Duration) -> Self {
        Self { queue, expiry }
    }

    pub fn is_eligible(&self, command: &Command, now: DateTime<Utc>) -> bool {
        !command.is_processed() && !command.is_expired(now, self.expiry)
    }

    /// Enqueue another execution of `command` after `delay`.
    ///
    /// Returns `false` without enqueueing when the command is expired or
    /// already processed.
    pub async fn schedule_retry(
        &self,
        command: &Command,
        delay: Duration,
    ) -> Result<bool, DispatchError> {
        if !self.is_eligible(command, Utc::now()) {
            debug!(
                "Not retrying command {} (processed: {}, age: {:?})",
                command.id,
                command.is_processed(),
                command.age(Utc::now())
            );
            return Ok(false);
        }

        self.queue
            .enqueue(
                Job::ExecuteCommand {
                    command_id: command.id,
                },
                delay,
            )
            .await?;
        info!("Command {} retrying in {:?}", command.id, delay);
        Ok(true)
    }
}
