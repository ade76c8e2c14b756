//! Chat command models

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chat_api::InboundCommand;

use crate::commands::parser::split_task;

/// Chat user who issued a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub slack_user_id: String,
    pub slack_user_name: String,

    /// Present once the user has connected GitHub
    #[serde(default)]
    pub github_token: Option<String>,
}

/// A command received from chat.
///
/// Everything except `processed_at` is fixed at creation; the store sets
/// `processed_at` once, for whichever execution attempt finishes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub command_text: String,
    pub task: String,
    pub subtask: String,
    pub channel_name: String,
    pub team_id: String,
    pub user: ChatUser,
    #[serde(default)]
    pub response_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Command {
    pub fn new(
        command_text: impl Into<String>,
        channel_name: impl Into<String>,
        team_id: impl Into<String>,
        user: ChatUser,
    ) -> Self {
        let command_text = command_text.into();
        let (task, subtask) = split_task(&command_text);
        Self {
            id: Uuid::new_v4(),
            task,
            subtask,
            command_text,
            channel_name: channel_name.into(),
            team_id: team_id.into(),
            user,
            response_url: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    pub fn with_response_url(mut self, response_url: impl Into<String>) -> Self {
        self.response_url = Some(response_url.into());
        self
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Time since the command was received; zero if the clock went backwards
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// True once the command is too old to keep retrying
    pub fn is_expired(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        self.age(now) >= expiry
    }
}

impl From<InboundCommand> for Command {
    fn from(inbound: InboundCommand) -> Self {
        let user = ChatUser {
            slack_user_id: inbound.user_id,
            slack_user_name: inbound.user_name,
            github_token: inbound.github_token,
        };
        let command = Command::new(inbound.text, inbound.channel_name, inbound.team_id, user);
        match inbound.response_url {
            Some(url) => command.with_response_url(url),
            None => command,
        }
    }
}
