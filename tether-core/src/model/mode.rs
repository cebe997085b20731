use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether this instance owns the rendezvous port or relays through the one that does.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum RunningMode {
    Server,
    Client,
}

/// Routing mode of the rendezvous host.
///
/// `Single` assumes one browser and hands every inbound message to the local
/// hardware owner. `Cloud` is entered as soon as a remote hardware participant
/// is connected and routes by room.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
pub enum CloudMode {
    #[serde(rename = "singleServer")]
    Single,
    #[serde(rename = "cloud")]
    Cloud,
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningMode::Server => f.write_str("server"),
            RunningMode::Client => f.write_str("client"),
        }
    }
}

impl fmt::Display for CloudMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudMode::Single => f.write_str("single server"),
            CloudMode::Cloud => f.write_str("cloud server"),
        }
    }
}
