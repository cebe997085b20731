use tether_core::{ConnectionId, ParticipantRole, RelayFrame};
use tokio::sync::mpsc;
use tracing::debug;

/// Instructions for a connection's websocket task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(RelayFrame),
    Close,
}

/// Host-side bookkeeping for one live websocket session.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    role: ParticipantRole,
    room_id: Option<String>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        role: ParticipantRole,
        room_id: Option<String>,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            id,
            role,
            room_id,
            outbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> ParticipantRole {
        self.role
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub(crate) fn set_room_id(&mut self, room_id: String) {
        self.room_id = Some(room_id);
    }

    pub fn send(&self, frame: RelayFrame) {
        if self.outbound.send(Outbound::Frame(frame)).is_err() {
            // Socket task already gone; its Closed event is on the way.
            debug!("Dropping frame for closed connection {}", self.id);
        }
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}
