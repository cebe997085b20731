use crate::host::HostSnapshot;
use std::net::SocketAddr;
use tether_core::{CloudMode, RunningMode};

/// Lifecycle of the role election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionState {
    Idle,
    /// Binding the port, or waiting to re-elect after losing a role.
    Electing,
    RunningAsServer,
    RunningAsClient,
    Closed,
}

/// Point-in-time view of the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub state: ElectionState,
    pub running_mode: RunningMode,
    pub cloud_mode: CloudMode,
    pub client_room_id: Option<String>,
    pub master_room_ids: Vec<String>,
    /// Present while running as server.
    pub host: Option<HostSnapshot>,
    pub local_addr: Option<SocketAddr>,
}
