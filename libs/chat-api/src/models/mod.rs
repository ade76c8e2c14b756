//! Chat API models

use serde::{Deserialize, Serialize};

/// Visibility of a reply in the originating channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    InChannel,
    Ephemeral,
}

/// Reply payload posted back to the chat channel.
///
/// Every field is optional; an empty response serializes to `{}` and
/// produces no visible message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Response {
    /// A response with nothing to show
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when posting this response would render nothing
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.attachments.is_empty()
    }
}

/// Structured block inside a reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Attachment {
    /// Attachment carrying only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Titled value rendered inside an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

/// Slash-command invocation as delivered by the chat platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundCommand {
    /// Full command text, e.g. `deploy hubot to production`
    pub text: String,

    pub channel_name: String,

    pub team_id: String,

    pub user_id: String,

    pub user_name: String,

    /// Where deferred replies are posted
    #[serde(default)]
    pub response_url: Option<String>,

    #[serde(default)]
    pub github_token: Option<String>,
}
