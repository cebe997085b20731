use crate::host::Outbound;
use tether_core::{ConnectionId, HandshakeQuery, RelayFrame};
use tokio::sync::mpsc;

/// Events the websocket tasks report to the coordinator, which owns the [`RelayHost`](crate::RelayHost).
///
/// `generation` identifies the listener the socket came through. Sockets of a
/// listener that was already torn down may still report, and are ignored.
#[derive(Debug)]
pub enum HostEvent {
    /// Handshake finished. `outbound` feeds the socket's writer.
    Accepted {
        generation: u64,
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<Outbound>,
        query: HandshakeQuery,
    },

    Frame {
        generation: u64,
        id: ConnectionId,
        frame: RelayFrame,
    },

    /// Socket closed, errored or missed its heartbeat.
    Closed { generation: u64, id: ConnectionId },
}

impl HostEvent {
    pub fn generation(&self) -> u64 {
        match self {
            HostEvent::Accepted { generation, .. }
            | HostEvent::Frame { generation, .. }
            | HostEvent::Closed { generation, .. } => *generation,
        }
    }
}
