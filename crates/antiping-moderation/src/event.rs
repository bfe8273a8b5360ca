//! Typed parsing of inbound room events.
//!
//! The homeserver hands us loosely typed JSON. This module converts it into
//! a [`RoomMessage`] up front, so the rest of the pipeline only sees checked
//! fields and malformed input fails with an error naming the field.

use antiping_core::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Event type carrying chat messages.
pub const ROOM_MESSAGE_TYPE: &str = "m.room.message";

/// Errors from parsing an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// A required field is absent.
    #[error("missing field `{field}`")]
    MissingField {
        /// Dotted path of the field
        field: &'static str,
    },

    /// A field has the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    WrongType {
        /// Dotted path of the field
        field: &'static str,
        /// Expected JSON type
        expected: &'static str,
    },
}

/// Message content category, from `content.msgtype`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// `m.text`
    Text,
    /// `m.image`
    Image,
    /// `m.audio`
    Audio,
    /// `m.video`
    Video,
    /// Any other message type (notices, emotes, files, ...)
    Other(String),
}

impl MessageKind {
    /// Parse a `msgtype` string.
    pub fn from_msgtype(msgtype: &str) -> Self {
        match msgtype {
            "m.text" => Self::Text,
            "m.image" => Self::Image,
            "m.audio" => Self::Audio,
            "m.video" => Self::Video,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Whether this is image, audio or video content.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Audio | Self::Video)
    }
}

/// A validated `m.room.message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMessage {
    /// Room the message was sent to
    pub room_id: String,
    /// Full user id of the sender
    pub sender: String,
    /// Origin server timestamp
    pub timestamp: Timestamp,
    /// Content category
    pub kind: MessageKind,
    /// HTML body, when the client sent one
    pub formatted_body: Option<String>,
}

impl RoomMessage {
    /// Parse an event; `Ok(None)` for events that are not room messages.
    pub fn from_event(event: &Value) -> Result<Option<Self>, EventError> {
        match optional_str(event, "type", "type")? {
            Some(ROOM_MESSAGE_TYPE) => {}
            _ => return Ok(None),
        }

        let room_id = required_str(event, "room_id", "room_id")?.to_owned();
        let sender = required_str(event, "sender", "sender")?.to_owned();
        let ts_ms = event
            .get("origin_server_ts")
            .ok_or(EventError::MissingField {
                field: "origin_server_ts",
            })?
            .as_u64()
            .ok_or(EventError::WrongType {
                field: "origin_server_ts",
                expected: "a non-negative integer",
            })?;

        let content = event.get("content").ok_or(EventError::MissingField {
            field: "content",
        })?;
        if !content.is_object() {
            return Err(EventError::WrongType {
                field: "content",
                expected: "an object",
            });
        }
        let msgtype = required_str(content, "msgtype", "content.msgtype")?;
        let formatted_body =
            optional_str(content, "formatted_body", "content.formatted_body")?.map(str::to_owned);

        Ok(Some(Self {
            room_id,
            sender,
            timestamp: Timestamp::from_millis(ts_ms),
            kind: MessageKind::from_msgtype(msgtype),
            formatted_body,
        }))
    }
}

fn required_str<'a>(
    value: &'a Value,
    key: &str,
    field: &'static str,
) -> Result<&'a str, EventError> {
    optional_str(value, key, field)?.ok_or(EventError::MissingField { field })
}

fn optional_str<'a>(
    value: &'a Value,
    key: &str,
    field: &'static str,
) -> Result<Option<&'a str>, EventError> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(EventError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_event() -> Value {
        json!({
            "type": "m.room.message",
            "room_id": "!room:example.org",
            "sender": "@alice:example.org",
            "origin_server_ts": 1_700_000_000_000u64,
            "content": {
                "msgtype": "m.text",
                "body": "hi",
                "formatted_body": "<b>hi</b>"
            }
        })
    }

    #[test]
    fn test_parses_text_message() {
        let message = RoomMessage::from_event(&text_event()).unwrap().unwrap();
        assert_eq!(message.room_id, "!room:example.org");
        assert_eq!(message.sender, "@alice:example.org");
        assert_eq!(message.timestamp.ts_ms, 1_700_000_000_000);
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.formatted_body.as_deref(), Some("<b>hi</b>"));
    }

    #[test]
    fn test_non_message_events_are_skipped() {
        let event = json!({ "type": "m.room.member", "room_id": 4 });
        assert_eq!(RoomMessage::from_event(&event).unwrap(), None);
        assert_eq!(RoomMessage::from_event(&json!({})).unwrap(), None);
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        let mut event = text_event();
        event.as_object_mut().unwrap().remove("sender");
        assert_eq!(
            RoomMessage::from_event(&event).unwrap_err(),
            EventError::MissingField { field: "sender" }
        );

        let mut event = text_event();
        event["origin_server_ts"] = json!("yesterday");
        assert!(matches!(
            RoomMessage::from_event(&event).unwrap_err(),
            EventError::WrongType {
                field: "origin_server_ts",
                ..
            }
        ));

        let mut event = text_event();
        event["content"]["msgtype"] = json!(7);
        assert!(matches!(
            RoomMessage::from_event(&event).unwrap_err(),
            EventError::WrongType {
                field: "content.msgtype",
                ..
            }
        ));
    }

    #[test]
    fn test_media_kinds() {
        assert!(MessageKind::from_msgtype("m.video").is_media());
        assert!(!MessageKind::from_msgtype("m.notice").is_media());
        assert_eq!(
            MessageKind::from_msgtype("m.file"),
            MessageKind::Other("m.file".to_owned())
        );
    }
}
