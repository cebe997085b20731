use crate::control::EventSink;
use crate::host::{Connection, HostEvent, Outbound};
use serde_json::Value;
use std::collections::HashMap;
use tether_core::{
    CloudMode, ConnectionId, EngineEvent, HandshakeQuery, ParticipantRole, RelayFrame, RoomTarget,
    ack_value,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Where an inbound message goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Hand it to the local hardware owner through the control channel.
    Upstream,
    /// Every browser joined to the room.
    Room(String),
    /// The hardware connection bound to the sender's room.
    Hardware(ConnectionId),
    Drop,
}

/// Connection and room bookkeeping of the rendezvous host.
///
/// Owned by the coordinator actor, so every mutation happens on one logical thread.
pub struct RelayHost {
    hardware: Vec<Connection>,
    browsers: Vec<Connection>,
    /// room id -> hardware connection serving it. Last writer wins; entries
    /// outlive the hardware connection that created them.
    bindings: HashMap<String, ConnectionId>,
    cloud_mode: CloudMode,
    events: EventSink,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub role: ParticipantRole,
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    pub cloud_mode: CloudMode,
    pub hardware: Vec<ConnectionInfo>,
    pub browsers: Vec<ConnectionInfo>,
    pub bindings: HashMap<String, ConnectionId>,
}

impl RelayHost {
    pub fn new(events: EventSink) -> Self {
        Self {
            hardware: Vec::new(),
            browsers: Vec::new(),
            bindings: HashMap::new(),
            cloud_mode: CloudMode::Single,
            events,
        }
    }

    pub fn cloud_mode(&self) -> CloudMode {
        self.cloud_mode
    }

    pub fn handle_event(&mut self, event: HostEvent, own_room: Option<&str>) {
        match event {
            HostEvent::Accepted {
                id,
                outbound,
                query,
                ..
            } => self.accept(id, outbound, &query),

            HostEvent::Frame { id, frame, .. } => match frame {
                RelayFrame::Message { payload, ack } => {
                    self.on_message(id, payload, ack, own_room)
                }
                RelayFrame::MatchTarget { room } => self.bind_room(id, room),
                RelayFrame::Ack { .. } => debug!("Ignoring ack frame from {}", id),
            },

            HostEvent::Closed { id, .. } => self.on_disconnect(id),
        }
    }

    /// Registers a connection, classified by the handshake's `childServer` flag.
    pub fn accept(
        &mut self,
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<Outbound>,
        query: &HandshakeQuery,
    ) {
        match query.role() {
            ParticipantRole::Hardware => {
                info!("Socket {} is hardware client", id);
                self.hardware
                    .push(Connection::new(id, ParticipantRole::Hardware, None, outbound));
            }
            ParticipantRole::Browser => {
                let room_id = query.room_id().map(str::to_owned);
                info!("Socket {} is browser client, roomId {:?}", id, room_id);
                self.browsers
                    .push(Connection::new(id, ParticipantRole::Browser, room_id, outbound));
            }
        }

        self.events.emit(EngineEvent::Connection);
        self.refresh_cloud_mode();
    }

    /// Records that a hardware connection serves `target`'s room.
    pub fn bind_room(&mut self, id: ConnectionId, target: RoomTarget) {
        let Some(room_id) = target.into_room_id() else {
            return;
        };
        let Some(connection) = self.hardware.iter_mut().find(|c| c.id() == id) else {
            debug!("Ignoring matchTarget from non-hardware socket {}", id);
            return;
        };

        info!("Hardware client {} requested browser target '{}'", id, room_id);
        connection.set_room_id(room_id.clone());
        self.bindings.insert(room_id, id);
    }

    pub fn on_message(
        &mut self,
        id: ConnectionId,
        payload: Value,
        ack: Option<u64>,
        own_room: Option<&str>,
    ) {
        let Some(sender) = self.find(id) else {
            debug!("Message from unknown socket {}", id);
            return;
        };

        if let Some(ack_id) = ack {
            sender.send(RelayFrame::Ack {
                id: ack_id,
                value: ack_value(&payload),
            });
        }

        let route = self.route_for(sender, own_room);
        debug!("Routing message from {} to {:?}", id, route);
        self.deliver(route, payload);
    }

    /// The routing decision table for a message sent by `sender`.
    pub fn route_for(&self, sender: &Connection, own_room: Option<&str>) -> Route {
        if self.cloud_mode == CloudMode::Single {
            return Route::Upstream;
        }

        match sender.role() {
            ParticipantRole::Hardware => match sender.room_id() {
                Some(room) => Route::Room(room.to_owned()),
                None => Route::Drop,
            },
            ParticipantRole::Browser => {
                let room = sender.room_id();
                if let Some(hardware) = room.and_then(|r| self.bindings.get(r)) {
                    Route::Hardware(*hardware)
                } else if room == own_room {
                    // Also covers a roomless browser while no own room is set
                    Route::Upstream
                } else {
                    Route::Drop
                }
            }
        }
    }

    fn deliver(&self, route: Route, payload: Value) {
        match route {
            Route::Upstream => self.events.emit(EngineEvent::Data(payload)),
            Route::Room(room) => self.multicast(&room, RelayFrame::message(payload)),
            Route::Hardware(target) => match self.hardware.iter().find(|c| c.id() == target) {
                Some(hardware) => hardware.send(RelayFrame::message(payload)),
                None => debug!("Bound hardware {} is gone, dropping message", target),
            },
            Route::Drop => {}
        }
    }

    /// Data the local hardware owner sends towards the browsers.
    pub fn relay_outbound(&self, data: Value, own_room: Option<&str>) {
        let frame = RelayFrame::data(data);
        match (self.cloud_mode, own_room) {
            (CloudMode::Cloud, Some(room)) => self.multicast(room, frame),
            _ => {
                for browser in &self.browsers {
                    browser.send(frame.clone());
                }
            }
        }
    }

    pub fn on_disconnect(&mut self, id: ConnectionId) {
        if let Some(index) = self.hardware.iter().position(|c| c.id() == id) {
            let connection = self.hardware.remove(index);
            info!("Hardware client {} is removed from list", id);
            if connection.is_open() {
                connection.close();
            }
            if self.hardware.is_empty() {
                self.set_cloud_mode(CloudMode::Single);
            }
        } else if let Some(index) = self.browsers.iter().position(|c| c.id() == id) {
            let connection = self.browsers.remove(index);
            info!("Browser client {} is removed from list", id);
            if connection.is_open() {
                connection.close();
            }
        }
    }

    /// Closes every connection. Used when the host role is torn down.
    pub fn shutdown(&mut self) {
        for connection in self.hardware.drain(..).chain(self.browsers.drain(..)) {
            connection.close();
        }
    }

    pub fn snapshot(&self) -> HostSnapshot {
        let info = |c: &Connection| ConnectionInfo {
            id: c.id(),
            role: c.role(),
            room_id: c.room_id().map(str::to_owned),
        };
        HostSnapshot {
            cloud_mode: self.cloud_mode,
            hardware: self.hardware.iter().map(info).collect(),
            browsers: self.browsers.iter().map(info).collect(),
            bindings: self.bindings.clone(),
        }
    }

    fn find(&self, id: ConnectionId) -> Option<&Connection> {
        self.hardware
            .iter()
            .chain(self.browsers.iter())
            .find(|c| c.id() == id)
    }

    fn multicast(&self, room: &str, frame: RelayFrame) {
        for browser in self.browsers.iter().filter(|c| c.room_id() == Some(room)) {
            browser.send(frame.clone());
        }
    }

    fn refresh_cloud_mode(&mut self) {
        if self.hardware.is_empty() {
            self.set_cloud_mode(CloudMode::Single);
        } else {
            self.set_cloud_mode(CloudMode::Cloud);
        }
    }

    fn set_cloud_mode(&mut self, mode: CloudMode) {
        if self.cloud_mode == mode {
            return;
        }
        info!("Cloud status: {}", mode);
        self.cloud_mode = mode;
        self.events.emit(EngineEvent::CloudModeChanged(mode));
    }
}
