//! Wire frames for the streaming relay. Everything is JSON text with a
//! numeric `op` and an optional `d` payload.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::session::Identity;

pub const OP_CHAT_EVENT: u64 = 0;
pub const OP_CHAT_SUBMIT: u64 = 1;
pub const OP_HEARTBEAT_HINT: u64 = 2;
pub const OP_PING: u64 = 3;
pub const OP_PONG: u64 = 4;

/// Chat content is trimmed, then capped to this many characters.
pub const MAX_CONTENT_CHARS: usize = 512;

/// One inbound frame. Unknown `op` values, however large, parse fine and
/// are discarded by the connection state machine; only structurally invalid
/// JSON is fatal.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub op: u64,
    #[serde(default)]
    pub content: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Chat-event author. `admin` is serialized only when true, mirroring the
/// identity-snapshot contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub username: String,
    pub color: String,
    #[serde(skip_serializing_if = "is_false")]
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatEvent {
    pub content: String,
    pub timestamp: i64,
    pub author: Author,
}

impl ChatEvent {
    /// Builds the outbound event for an accepted submit: trim, cap to
    /// [`MAX_CONTENT_CHARS`], stamp the server clock, copy the author fields
    /// from the connection's identity snapshot.
    pub fn build(content: &str, identity: &Identity) -> Self {
        Self {
            content: content.trim().chars().take(MAX_CONTENT_CHARS).collect(),
            timestamp: Utc::now().timestamp_millis(),
            author: Author {
                username: identity.username.clone(),
                color: identity.color.clone(),
                admin: identity.admin,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum ServerFrame {
    ChatEvent(ChatEvent),
    /// Advertises the expected liveness cadence in milliseconds; sent once,
    /// immediately after admission.
    HeartbeatHint(u64),
    Pong,
}

impl ServerFrame {
    pub fn to_json(&self) -> String {
        match self {
            ServerFrame::ChatEvent(event) => json!({ "op": OP_CHAT_EVENT, "d": event }),
            ServerFrame::HeartbeatHint(ms) => json!({ "op": OP_HEARTBEAT_HINT, "d": ms }),
            ServerFrame::Pong => json!({ "op": OP_PONG }),
        }
        .to_string()
    }

    pub fn to_message(&self) -> Message {
        Message::Text(self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(admin: bool) -> Identity {
        Identity {
            username: "alice".into(),
            email: "alice@example.com".into(),
            color: "#abcdef".into(),
            admin,
        }
    }

    #[test]
    fn test_chat_event_trims_and_caps_content() {
        let event = ChatEvent::build("   hello world   ", &identity(false));
        assert_eq!(event.content, "hello world");

        let long: String = "x".repeat(600);
        let event = ChatEvent::build(&long, &identity(false));
        assert_eq!(event.content.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn test_chat_event_cap_is_char_based() {
        // 600 two-byte characters must cap at 512 characters, not bytes
        let long: String = "é".repeat(600);
        let event = ChatEvent::build(&long, &identity(false));
        assert_eq!(event.content.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn test_author_admin_field_asymmetry() {
        let event = ChatEvent::build("hi", &identity(false));
        let value = serde_json::to_value(&event).unwrap();
        assert!(value["author"].get("admin").is_none());

        let event = ChatEvent::build("hi", &identity(true));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["author"]["admin"], true);
    }

    #[test]
    fn test_server_frame_envelopes() {
        let hint: serde_json::Value =
            serde_json::from_str(&ServerFrame::HeartbeatHint(30000).to_json()).unwrap();
        assert_eq!(hint["op"], 2);
        assert_eq!(hint["d"], 30000);

        let pong: serde_json::Value =
            serde_json::from_str(&ServerFrame::Pong.to_json()).unwrap();
        assert_eq!(pong["op"], 4);
        assert!(pong.get("d").is_none());

        let event = ServerFrame::ChatEvent(ChatEvent::build("hi", &identity(false)));
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["op"], 0);
        assert_eq!(value["d"]["content"], "hi");
        assert_eq!(value["d"]["author"]["username"], "alice");
    }

    #[test]
    fn test_client_frame_tolerates_missing_content() {
        let frame: ClientFrame = serde_json::from_str(r#"{"op":3}"#).unwrap();
        assert_eq!(frame.op, OP_PING);
        assert!(frame.content.is_none());

        let frame: ClientFrame =
            serde_json::from_str(r#"{"op":1,"content":"hey"}"#).unwrap();
        assert_eq!(frame.op, OP_CHAT_SUBMIT);
        assert_eq!(frame.content.as_deref(), Some("hey"));

        assert!(serde_json::from_str::<ClientFrame>("not json").is_err());
    }

    #[test]
    fn test_client_frame_accepts_out_of_range_opcodes() {
        // opcodes past the defined range must still parse; the connection
        // state machine discards them rather than killing the connection
        let frame: ClientFrame = serde_json::from_str(r#"{"op":300}"#).unwrap();
        assert_eq!(frame.op, 300);

        let frame: ClientFrame =
            serde_json::from_str(r#"{"op":4294967296,"content":"x"}"#).unwrap();
        assert_eq!(frame.op, 4_294_967_296);
    }
}
