//! JSON wire frames exchanged over the channel.
//!
//! Inbound parsing is tolerant: unknown frame types are ignored and
//! malformed frames are dropped with a logged diagnostic. Neither raises
//! to the caller.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::TransportEvent;
use crate::session::SessionIdentity;

/// Frames sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    #[serde(rename_all = "camelCase")]
    Join {
        user_id: String,
        username: String,
        instance_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        activity_id: Option<String>,
    },
    Message { message: String },
}

impl OutboundFrame {
    /// The join frame carrying the full session identity.
    pub fn join(identity: &SessionIdentity) -> Self {
        Self::Join {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            instance_id: identity.instance_id.clone(),
            activity_id: identity.activity_id.clone(),
        }
    }

    /// A chat message frame.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message {
            message: text.into(),
        }
    }
}

/// Frames received from the backend.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundFrame {
    #[serde(rename_all = "camelCase")]
    Message { user_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    UserJoined { user_id: String },
    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: String },
    Error { message: String },
    #[serde(other)]
    Unknown,
}

/// Parse one inbound frame into a transport event.
pub fn parse_inbound(text: &str) -> Option<TransportEvent> {
    match serde_json::from_str::<InboundFrame>(text) {
        Ok(InboundFrame::Message { user_id, message }) => Some(TransportEvent::ChatMessage {
            sender_id: user_id,
            text: message,
        }),
        Ok(InboundFrame::UserJoined { user_id }) => Some(TransportEvent::UserJoined { user_id }),
        Ok(InboundFrame::UserLeft { user_id }) => Some(TransportEvent::UserLeft { user_id }),
        Ok(InboundFrame::Error { message }) => Some(TransportEvent::ServerError { text: message }),
        Ok(InboundFrame::Unknown) => {
            debug!("ignoring frame with unknown type");
            None
        }
        Err(e) => {
            warn!("dropping malformed frame: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TransportEvent;

    #[test]
    fn test_join_frame_wire_format() {
        let identity = SessionIdentity::new("u1", "Alice", "inst-1", Some("act-9".into()));
        let json = serde_json::to_value(OutboundFrame::join(&identity)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "join",
                "userId": "u1",
                "username": "Alice",
                "instanceId": "inst-1",
                "activityId": "act-9",
            })
        );
    }

    #[test]
    fn test_join_frame_omits_absent_activity() {
        let identity = SessionIdentity::new("u1", "Alice", "inst-1", None);
        let json = serde_json::to_value(OutboundFrame::join(&identity)).unwrap();
        assert!(json.get("activityId").is_none());
    }

    #[test]
    fn test_message_frame_wire_format() {
        let json = serde_json::to_value(OutboundFrame::message("hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "message", "message": "hello"})
        );
    }

    #[test]
    fn test_parse_inbound_message() {
        let event = parse_inbound(r#"{"type":"message","userId":"u2","message":"hi"}"#).unwrap();
        match event {
            TransportEvent::ChatMessage { sender_id, text } => {
                assert_eq!(sender_id, "u2");
                assert_eq!(text, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_inbound_presence() {
        let joined = parse_inbound(r#"{"type":"user_joined","userId":"u3"}"#).unwrap();
        assert!(matches!(joined, TransportEvent::UserJoined { user_id } if user_id == "u3"));

        let left = parse_inbound(r#"{"type":"user_left","userId":"u3"}"#).unwrap();
        assert!(matches!(left, TransportEvent::UserLeft { user_id } if user_id == "u3"));
    }

    #[test]
    fn test_parse_inbound_error() {
        let event = parse_inbound(r#"{"type":"error","message":"room full"}"#).unwrap();
        assert!(matches!(event, TransportEvent::ServerError { text } if text == "room full"));
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        assert!(parse_inbound(r#"{"type":"telemetry","ping":12}"#).is_none());
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        assert!(parse_inbound("{not json").is_none());
        assert!(parse_inbound(r#"{"no_type_field":true}"#).is_none());
        // Right type, missing required field
        assert!(parse_inbound(r#"{"type":"message","userId":"u2"}"#).is_none());
    }
}
