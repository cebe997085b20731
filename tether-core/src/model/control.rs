use crate::model::mode::{CloudMode, RunningMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload relayed to browsers when the parent reports the hardware as gone.
pub const DISCONNECT_HARDWARE_SENTINEL: &str = "disconnectHardware";

/// Commands received from the parent process.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Open { port: Option<u16> },
    AddRoomId(Option<String>),
    Send(Value),
    DisconnectHardware,
}

impl ControlCommand {
    /// Interprets a `{key, value}` message. Anything unrecognised yields `None`.
    pub fn from_value(message: Value) -> Option<Self> {
        let Value::Object(mut fields) = message else {
            return None;
        };
        let Some(Value::String(key)) = fields.remove("key") else {
            return None;
        };
        let value = fields.remove("value").unwrap_or(Value::Null);

        match key.as_str() {
            "open" => Some(ControlCommand::Open {
                port: value.as_u64().and_then(|port| u16::try_from(port).ok()),
            }),
            "addRoomId" => Some(ControlCommand::AddRoomId(room_id_of(value))),
            "send" => Some(ControlCommand::Send(value)),
            "disconnectHardware" => Some(ControlCommand::DisconnectHardware),
            _ => None,
        }
    }

    pub fn from_json(line: &str) -> Option<Self> {
        serde_json::from_str::<Value>(line)
            .ok()
            .and_then(Self::from_value)
    }
}

fn room_id_of(value: Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Events forwarded to the parent process as `{key, value}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "camelCase")]
pub enum EngineEvent {
    RunningModeChanged(RunningMode),
    CloudModeChanged(CloudMode),
    Data(Value),
    Close,
    Connection,
}
