use crate::model::connection::ParticipantRole;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A single websocket text frame exchanged on the relay endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RelayFrame {
    /// Opaque data. `ack` asks the receiver to answer with [`RelayFrame::Ack`].
    Message {
        payload: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<u64>,
    },

    /// Sent by a hardware participant to claim the browser room it serves.
    MatchTarget { room: RoomTarget },

    Ack { id: u64, value: Value },
}

impl RelayFrame {
    pub fn message(payload: Value) -> Self {
        RelayFrame::Message { payload, ack: None }
    }

    /// Wraps `data` the way every relayed send is shaped: `{"data": ...}`.
    pub fn data(data: Value) -> Self {
        Self::message(json!({ "data": data }))
    }

    pub fn match_target(room_id: impl Into<String>) -> Self {
        RelayFrame::MatchTarget {
            room: RoomTarget::Bare(room_id.into()),
        }
    }
}

/// The value echoed back for an acknowledged message: the payload's `key`
/// field when it has one (null included), `true` otherwise.
pub fn ack_value(payload: &Value) -> Value {
    payload.get("key").cloned().unwrap_or(Value::Bool(true))
}

/// Bind-room argument. Peers send either a bare id or `{"roomId": id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomTarget {
    Bare(String),
    Object {
        #[serde(rename = "roomId", default)]
        room_id: Option<String>,
    },
}

impl RoomTarget {
    pub fn into_room_id(self) -> Option<String> {
        let room_id = match self {
            RoomTarget::Bare(id) => Some(id),
            RoomTarget::Object { room_id } => room_id,
        };
        room_id.filter(|id| !id.is_empty())
    }
}

/// Query string of the relay websocket handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandshakeQuery {
    #[serde(rename = "childServer", default, skip_serializing_if = "Option::is_none")]
    pub child_server: Option<String>,

    #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl HandshakeQuery {
    pub fn hardware() -> Self {
        Self {
            child_server: Some("true".to_owned()),
            room_id: None,
        }
    }

    pub fn browser(room_id: impl Into<String>) -> Self {
        Self {
            child_server: None,
            room_id: Some(room_id.into()),
        }
    }

    pub fn role(&self) -> ParticipantRole {
        match self.child_server.as_deref() {
            Some("true") => ParticipantRole::Hardware,
            _ => ParticipantRole::Browser,
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref().filter(|id| !id.is_empty())
    }
}
