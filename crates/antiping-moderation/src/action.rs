//! Outward moderation actions.
//!
//! Every action is ultimately a message sent to a room: a notice in the log
//! room, an alert in the offending room, or a command to the moderation bot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTML format marker for formatted bodies.
pub const HTML_FORMAT: &str = "org.matrix.custom.html";

/// A message to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination room
    pub room: String,
    /// Plain-text body
    pub body: String,
    /// HTML body
    pub formatted: Option<String>,
    /// Send as `m.notice` rather than `m.text`
    pub notice: bool,
    /// Join the room before sending
    pub join: bool,
}

impl OutboundMessage {
    /// Plain `m.text` message that joins the room first.
    pub fn text(room: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            body: body.into(),
            formatted: None,
            notice: false,
            join: true,
        }
    }

    /// Send as a notice.
    pub fn as_notice(mut self) -> Self {
        self.notice = true;
        self
    }

    /// Attach an HTML body.
    pub fn with_formatted(mut self, formatted: impl Into<String>) -> Self {
        self.formatted = Some(formatted.into());
        self
    }

    /// Event content in client-server API shape.
    pub fn content(&self) -> serde_json::Value {
        let msgtype = if self.notice { "m.notice" } else { "m.text" };
        let mut content = serde_json::json!({
            "msgtype": msgtype,
            "body": self.body,
        });
        if let Some(formatted) = &self.formatted {
            content["format"] = HTML_FORMAT.into();
            content["formatted_body"] = formatted.as_str().into();
        }
        content
    }
}

/// What an action is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Notice in the log room
    LogNotice,
    /// Warning posted in the offending room
    SpamAlert,
    /// Ban command for the moderation bot
    BanCommand,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::LogNotice => "log_notice",
            Self::SpamAlert => "spam_alert",
            Self::BanCommand => "ban_command",
        };
        f.write_str(label)
    }
}

/// A composed moderation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationAction {
    /// Purpose
    pub kind: ActionKind,
    /// Identity the action concerns
    pub target: String,
    /// Message to deliver
    pub message: OutboundMessage,
}

impl ModerationAction {
    /// Create an action.
    pub fn new(kind: ActionKind, target: impl Into<String>, message: OutboundMessage) -> Self {
        Self {
            kind,
            target: target.into(),
            message,
        }
    }
}
