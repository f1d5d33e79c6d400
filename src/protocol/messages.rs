// ABOUTME: Protocol message type definitions and serialization
// ABOUTME: Supports user-list and ptt-status control events

use serde::{Deserialize, Serialize};

/// Top-level protocol message envelope.
///
/// Control traffic is JSON text tagged by event name. Audio frames are
/// not part of this envelope: a `ptt-stream` frame travels as a binary
/// WebSocket message carrying the raw little-endian f32 sample buffer,
/// relayed by the server without inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    /// Full roster snapshot, sent to all sessions on any membership change
    #[serde(rename = "user-list")]
    UserList(Vec<UserEntry>),

    /// Talk indicator toggle; the server stamps the sender id before relay
    #[serde(rename = "ptt-status")]
    PttStatus(PttStatus),
}

/// One participant in a roster snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// Opaque session identifier, unique for the session's lifetime
    pub id: String,
    /// Human-readable display name derived from the session id
    pub name: String,
}

/// Talk-status event.
///
/// Outbound from a client the `id` field is omitted; the relay attaches
/// the sender's session id (overwriting anything the sender supplied)
/// before forwarding to the other sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PttStatus {
    /// Sender session id, stamped by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether the participant is currently transmitting
    #[serde(rename = "isTalking")]
    pub is_talking: bool,
}

impl Message {
    /// Serialize to the JSON text form used on the wire.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::error::Error::Protocol(e.to_string()))
    }

    /// Parse a message from its JSON text form.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::error::Error::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_list_wire_shape() {
        let msg = Message::UserList(vec![UserEntry {
            id: "abcd-1234".to_string(),
            name: "Device abcd".to_string(),
        }]);
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"user-list\""));
        assert!(json.contains("\"name\":\"Device abcd\""));

        match Message::from_json(&json).unwrap() {
            Message::UserList(users) => assert_eq!(users.len(), 1),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn status_omits_id_outbound() {
        let msg = Message::PttStatus(PttStatus {
            id: None,
            is_talking: true,
        });
        let json = msg.to_json().unwrap();
        assert!(!json.contains("\"id\""));
        assert!(json.contains("\"isTalking\":true"));
    }

    #[test]
    fn status_parses_without_id() {
        // What a client actually sends: no id field at all.
        let msg =
            Message::from_json(r#"{"type":"ptt-status","payload":{"isTalking":false}}"#).unwrap();
        match msg {
            Message::PttStatus(status) => {
                assert_eq!(status.id, None);
                assert!(!status.is_talking);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
