use serde_json::Value;

/// Events the relay client reports to the coordinator.
///
/// `generation` identifies the client instance, so reports from a client the
/// coordinator already discarded can be ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected { generation: u64 },
    Data { generation: u64, payload: Value },
    /// Session dropped or every connect attempt failed. Sent once.
    Lost { generation: u64, reason: String },
}

impl ClientEvent {
    pub fn generation(&self) -> u64 {
        match self {
            ClientEvent::Connected { generation }
            | ClientEvent::Data { generation, .. }
            | ClientEvent::Lost { generation, .. } => *generation,
        }
    }
}
